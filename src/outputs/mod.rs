//! Files generated from the stored landmarks.
//!
//! # Submodules
//!
//! - [`sitemap`]: `sitemap.xml` (and numbered parts past 50 000 URLs) for
//!   search engines
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── sitemap.xml            # urlset, or sitemapindex when split
//!     sitemap1.xml ..        # only when split
//! ```

pub mod sitemap;

pub use sitemap::{generate_sitemap, write_sitemap};
