//! Metadata sidecar files written next to downloaded images

use chrono::{DateTime, FixedOffset, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::files::write_replacing;
use crate::core::{Result, SidecarFormat};
use crate::media::metadata::MediaMetadata;

const CREATOR_TOOL: &str = "ZenfolioBackup";
const XMP_PACKET_ID: &str = "W5M0MpCehiHzreSzNTczkc9d";

static STRONG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?strong>").expect("static pattern"));

/// Sidecar location for an asset: same stem, format's extension
pub fn sidecar_path(asset: &Path, format: SidecarFormat) -> PathBuf {
    asset.with_extension(format.extension())
}

/// Strip emphasis markup and decode HTML entities from user-entered text
pub fn clean_markup(input: &str) -> String {
    let stripped = STRONG_TAG.replace_all(input, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

fn xml_text(value: &str) -> String {
    html_escape::encode_text(value).into_owned()
}

/// Render an XMP packet
pub fn render_xmp(metadata: &MediaMetadata, metadata_date: DateTime<FixedOffset>) -> String {
    let title = clean_markup(&metadata.title);
    let caption = clean_markup(&metadata.caption);

    let mut xmp = String::new();
    xmp.push_str(&format!("<?xpacket begin=\"\u{feff}\" id=\"{XMP_PACKET_ID}\"?>\n"));
    xmp.push_str(&format!("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\" x:xmptk=\"{CREATOR_TOOL}\">\n"));
    xmp.push_str("  <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n");
    xmp.push_str(
        "    <rdf:Description rdf:about=\"\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\">\n",
    );

    for (element, value) in [("dc:title", &title), ("dc:description", &caption)] {
        if !value.is_empty() {
            xmp.push_str(&format!("      <{element}>\n"));
            xmp.push_str("        <rdf:Alt>\n");
            xmp.push_str(&format!("          <rdf:li xml:lang=\"x-default\">{}</rdf:li>\n", xml_text(value)));
            xmp.push_str("        </rdf:Alt>\n");
            xmp.push_str(&format!("      </{element}>\n"));
        }
    }

    if !metadata.copyright.is_empty() {
        xmp.push_str(&format!("      <dc:rights>{}</dc:rights>\n", xml_text(&metadata.copyright)));
    }

    if !metadata.keywords.is_empty() {
        xmp.push_str("      <dc:subject>\n");
        xmp.push_str("        <rdf:Bag>\n");
        for keyword in &metadata.keywords {
            xmp.push_str(&format!("          <rdf:li>{}</rdf:li>\n", xml_text(keyword)));
        }
        xmp.push_str("        </rdf:Bag>\n");
        xmp.push_str("      </dc:subject>\n");
    }

    xmp.push_str(&format!("      <xmp:CreatorTool>{CREATOR_TOOL}</xmp:CreatorTool>\n"));
    xmp.push_str(&format!(
        "      <xmp:MetadataDate>{}</xmp:MetadataDate>\n",
        metadata_date.format("%Y-%m-%dT%H:%M:%S%:z")
    ));
    xmp.push_str(&format!("      <xmp:CreateDate>{}</xmp:CreateDate>\n", xml_text(&metadata.captured_at)));
    xmp.push_str("    </rdf:Description>\n");
    xmp.push_str("  </rdf:RDF>\n");
    xmp.push_str("</x:xmpmeta>\n");
    xmp.push_str("<?xpacket end=\"w\"?>\n");
    xmp
}

/// Render the plain `Key: value` sidecar
pub fn render_text(item_id: i64, metadata: &MediaMetadata) -> String {
    format!(
        "Photo ID: {item_id}\n\
         Title: {}\n\
         Caption: {}\n\
         Copyright: {}\n\
         Keywords: {}\n\
         DateTimeOriginal: {}\n",
        clean_markup(&metadata.title),
        clean_markup(&metadata.caption),
        metadata.copyright,
        metadata.keywords_joined(),
        metadata.captured_at,
    )
}

/// Write the sidecar for an asset, replacing any previous one
pub async fn write_sidecar(
    asset: &Path,
    item_id: i64,
    metadata: &MediaMetadata,
    format: SidecarFormat,
) -> Result<PathBuf> {
    let path = sidecar_path(asset, format);
    let contents = match format {
        SidecarFormat::Xmp => render_xmp(metadata, Local::now().fixed_offset()),
        SidecarFormat::Text => render_text(item_id, metadata),
    };

    write_replacing(&path, &contents).await?;
    debug!("Saved {} sidecar to {}", format, path.display());
    Ok(path)
}
