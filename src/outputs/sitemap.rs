//! XML sitemap generation.
//!
//! Every landmark page is listed as `{domain}/landmark/{translated_name}`,
//! followed by the site root. Up to [`MAX_URLS_PER_FILE`] URLs go straight into
//! `sitemap.xml`; past that the URLs are split across `sitemap1.xml` ..
//! `sitemapN.xml` and `sitemap.xml` becomes a sitemap index pointing at them.

use crate::config::SitemapConfig;
use crate::models::Landmark;
use crate::repository::LandmarkStore;
use crate::utils::ensure_writable_dir;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

pub const MAX_URLS_PER_FILE: usize = 50_000;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const LANDMARK_PRIORITY: f32 = 0.7;
const ROOT_PRIORITY: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
struct UrlEntry {
    loc: String,
    priority: f32,
}

/// Build the URL list: landmarks in the given order, then the site root.
fn url_entries(landmarks: &[Landmark], domain: &str) -> Vec<UrlEntry> {
    let domain = domain.trim_end_matches('/');
    let mut entries: Vec<UrlEntry> = landmarks
        .iter()
        .filter(|landmark| {
            if landmark.translated_name.is_empty() {
                warn!(id = landmark.id, name = %landmark.name, "Landmark has no translated name; not in sitemap");
                return false;
            }
            true
        })
        .map(|landmark| UrlEntry {
            loc: format!(
                "{}/landmark/{}",
                domain,
                urlencoding::encode(&landmark.translated_name)
            ),
            priority: LANDMARK_PRIORITY,
        })
        .collect();

    entries.push(UrlEntry {
        loc: format!("{}/", domain),
        priority: ROOT_PRIORITY,
    });
    entries
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn new_document(root: &str) -> Result<Writer<Vec<u8>>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new(root).with_attributes([("xmlns", SITEMAP_NS)]),
    ))?;
    Ok(writer)
}

fn finish_document(mut writer: Writer<Vec<u8>>, root: &str) -> Result<Vec<u8>> {
    writer.write_event(Event::End(BytesEnd::new(root)))?;
    let mut xml = writer.into_inner();
    xml.push(b'\n');
    Ok(xml)
}

fn render_urlset(entries: &[UrlEntry], lastmod: &str) -> Result<Vec<u8>> {
    let mut writer = new_document("urlset")?;
    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        text_element(&mut writer, "loc", &entry.loc)?;
        text_element(&mut writer, "lastmod", lastmod)?;
        text_element(&mut writer, "changefreq", "always")?;
        text_element(&mut writer, "priority", &format!("{:.1}", entry.priority))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }
    finish_document(writer, "urlset")
}

fn render_index(locs: &[String], lastmod: &str) -> Result<Vec<u8>> {
    let mut writer = new_document("sitemapindex")?;
    for loc in locs {
        writer.write_event(Event::Start(BytesStart::new("sitemap")))?;
        text_element(&mut writer, "loc", loc)?;
        text_element(&mut writer, "lastmod", lastmod)?;
        writer.write_event(Event::End(BytesEnd::new("sitemap")))?;
    }
    finish_document(writer, "sitemapindex")
}

async fn write_file(path: PathBuf, xml: Vec<u8>) -> Result<PathBuf> {
    fs::write(&path, xml)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote sitemap file");
    Ok(path)
}

/// Write the sitemap for `landmarks` into `dir`. Returns the files written.
pub async fn write_sitemap(
    landmarks: &[Landmark],
    domain: &str,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    write_sitemap_with_limit(landmarks, domain, dir, now, MAX_URLS_PER_FILE).await
}

async fn write_sitemap_with_limit(
    landmarks: &[Landmark],
    domain: &str,
    dir: &Path,
    now: DateTime<Utc>,
    max_urls: usize,
) -> Result<Vec<PathBuf>> {
    ensure_writable_dir(dir).await?;

    let entries = url_entries(landmarks, domain);
    let lastmod = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    if entries.len() <= max_urls {
        let xml = render_urlset(&entries, &lastmod)?;
        return Ok(vec![write_file(dir.join("sitemap.xml"), xml).await?]);
    }

    let domain = domain.trim_end_matches('/');
    let mut written = Vec::new();
    let mut index_locs = Vec::new();
    for (i, chunk) in entries.chunks(max_urls).enumerate() {
        let name = format!("sitemap{}.xml", i + 1);
        let xml = render_urlset(chunk, &lastmod)?;
        written.push(write_file(dir.join(&name), xml).await?);
        index_locs.push(format!("{}/{}", domain, name));
    }

    let index = render_index(&index_locs, &lastmod)?;
    written.push(write_file(dir.join("sitemap.xml"), index).await?);
    Ok(written)
}

/// Load every landmark and write the sitemap configured in `config`.
#[instrument(level = "info", skip_all, fields(domain = %config.domain, output_dir = %config.output_dir.display()))]
pub async fn generate_sitemap(
    store: &dyn LandmarkStore,
    config: &SitemapConfig,
) -> Result<Vec<PathBuf>> {
    let landmarks = store
        .get_landmarks(None, &[])
        .await
        .context("failed to load landmarks")?;

    let files = write_sitemap(&landmarks, &config.domain, &config.output_dir, Utc::now()).await?;
    for (i, file) in files.iter().enumerate() {
        info!(file_no = i + 1, path = %file.display(), "Sitemap file");
    }
    Ok(files)
}
