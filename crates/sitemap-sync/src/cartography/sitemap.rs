//! Sitemap XML: parsing `urlset` documents and rendering the published one.

use crate::config::normalize_prefix;
use crate::errors::{Result, SyncError};
use crate::record::PageRecord;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Namespace of the sitemap protocol.
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Object name of the published document.
pub const SITEMAP_FILE_NAME: &str = "sitemap.xml";

/// Content type of the published document.
pub const SITEMAP_CONTENT_TYPE: &str = "application/xml";

/// A `<url>` entry as it appears in a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

/// Parse a `urlset` document into its `url` entries.
///
/// Fails when the document is not well-formed or has no `url` entries.
/// Entries without a `loc` are skipped.
pub fn parse_urlset(xml: &str) -> Result<Vec<SitemapEntry>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut saw_urlset = false;
    let mut url_elements = 0usize;
    let mut in_url = false;
    // Elements open below the current <url>; fields are its direct children.
    let mut url_depth = 0usize;
    let mut current_tag = String::new();
    let mut loc = String::new();
    let mut lastmod: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if in_url {
                    url_depth += 1;
                    current_tag = if url_depth == 1 { name } else { String::new() };
                    continue;
                }
                match name.as_str() {
                    "urlset" => saw_urlset = true,
                    "url" if saw_urlset => {
                        in_url = true;
                        url_depth = 0;
                        url_elements += 1;
                        loc.clear();
                        lastmod = None;
                    }
                    _ => {}
                }
                current_tag.clear();
            }
            Ok(Event::Empty(ref e)) if !in_url => match e.local_name().as_ref() {
                b"urlset" => saw_urlset = true,
                b"url" if saw_urlset => url_elements += 1,
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_url => {
                let text = e
                    .unescape()
                    .map_err(|err| SyncError::Parse(err.to_string()))?;
                assign_field(&current_tag, &text, &mut loc, &mut lastmod);
            }
            Ok(Event::CData(ref e)) if in_url => {
                let text = String::from_utf8_lossy(e);
                assign_field(&current_tag, &text, &mut loc, &mut lastmod);
            }
            Ok(Event::End(_)) if in_url && url_depth > 0 => {
                url_depth -= 1;
                current_tag.clear();
            }
            Ok(Event::End(ref e)) => {
                if e.local_name().as_ref() == b"url" && in_url {
                    if !loc.is_empty() {
                        entries.push(SitemapEntry {
                            loc: loc.clone(),
                            lastmod: lastmod.take().filter(|l| !l.is_empty()),
                        });
                    }
                    in_url = false;
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SyncError::Parse(format!(
                    "invalid xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if !saw_urlset || url_elements == 0 {
        return Err(SyncError::Parse("no URLs found".into()));
    }
    Ok(entries)
}

fn assign_field(tag: &str, text: &str, loc: &mut String, lastmod: &mut Option<String>) {
    match tag {
        "loc" => *loc = text.trim().to_string(),
        "lastmod" => *lastmod = Some(text.trim().to_string()),
        _ => {}
    }
}

fn render_err(e: impl std::fmt::Display) -> SyncError {
    SyncError::Render(e.to_string())
}

/// Serialize records into a sitemap document.
///
/// Output depends only on the records and their order.
pub fn render_sitemap(records: &[PageRecord]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(render_err)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("urlset").with_attributes([("xmlns", SITEMAP_NAMESPACE)]),
        ))
        .map_err(render_err)?;

    for record in records.iter().filter(|r| !r.loc.is_empty()) {
        let mut fields = vec![("loc", record.loc.as_str())];
        if let Some(lastmod) = record.lastmod.as_deref().filter(|l| !l.is_empty()) {
            fields.push(("lastmod", lastmod));
        }

        writer
            .write_event(Event::Start(BytesStart::new("url")))
            .map_err(render_err)?;
        for (tag, value) in fields {
            writer
                .write_event(Event::Start(BytesStart::new(tag)))
                .map_err(render_err)?;
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(render_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(tag)))
                .map_err(render_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("url")))
            .map_err(render_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("urlset")))
        .map_err(render_err)?;

    let mut xml = String::from_utf8(writer.into_inner()).map_err(render_err)?;
    xml.push('\n');
    Ok(xml)
}

/// Destination object for a configured target prefix.
pub fn sitemap_object_path(target_prefix: &str) -> String {
    let prefix = normalize_prefix(target_prefix);
    if prefix.is_empty() {
        SITEMAP_FILE_NAME.to_string()
    } else {
        format!("{prefix}/{SITEMAP_FILE_NAME}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(loc: &str, lastmod: Option<&str>) -> PageRecord {
        PageRecord::new(loc, lastmod.map(String::from))
    }

    #[test]
    fn test_render_layout() {
        let xml = render_sitemap(&[rec("https://site.example/docs/bar", Some("2024-01-01"))])
            .unwrap();
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://site.example/docs/bar</loc>
    <lastmod>2024-01-01</lastmod>
  </url>
</urlset>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_render_suppresses_empty_lastmod() {
        let xml = render_sitemap(&[
            rec("https://site.example/a", None),
            rec("https://site.example/b", Some("")),
        ])
        .unwrap();
        assert!(!xml.contains("lastmod"));
        assert_eq!(xml.matches("<url>").count(), 2);
    }

    #[test]
    fn test_render_is_byte_stable() {
        let records = vec![
            rec("https://site.example/a?x=1&y=2", Some("2024-02-02")),
            rec("https://site.example/b/", Some("2023-05-05")),
        ];
        assert_eq!(
            render_sitemap(&records).unwrap(),
            render_sitemap(&records).unwrap()
        );
    }

    #[test]
    fn test_render_then_parse_returns_records() {
        let records = vec![
            rec("https://site.example/a?x=1&y=<2>", Some("2024-02-02")),
            rec("https://site.example/b/", None),
            rec("https://site.example/b/", Some("2023-05-05")),
        ];
        let xml = render_sitemap(&records).unwrap();
        let parsed: Vec<PageRecord> = parse_urlset(&xml)
            .unwrap()
            .into_iter()
            .map(|e| PageRecord::new(e.loc, e.lastmod))
            .collect();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_render_empty_set() {
        let xml = render_sitemap(&[]).unwrap();
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(!xml.contains("<url>"));
    }

    #[test]
    fn test_parse_upstream_shape() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc> https://edge.example/docs/bar </loc><lastmod>2024-01-01</lastmod></url>
          <url><loc>https://edge.example/docs/baz</loc></url>
          <url><lastmod>2024-01-01</lastmod></url>
        </urlset>"#;
        let entries = parse_urlset(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].loc, "https://edge.example/docs/bar");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-01-01"));
        assert_eq!(entries[1].lastmod, None);
    }

    #[test]
    fn test_parse_ignores_nested_extension_fields() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                xmlns:image="http://www.google.com/schemas/sitemap-image/1.1"
                xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
          <url>
            <loc>https://edge.example/docs/bar</loc>
            <lastmod>2024-01-01</lastmod>
            <image:image>
              <image:loc>https://edge.example/media/hero.png</image:loc>
            </image:image>
            <news:news><news:lastmod>2025-12-31</news:lastmod></news:news>
          </url>
          <url>
            <image:image><image:loc>https://edge.example/media/only.png</image:loc></image:image>
            <loc>https://edge.example/docs/baz</loc>
          </url>
        </urlset>"#;
        let entries = parse_urlset(xml).unwrap();
        assert_eq!(
            entries,
            vec![
                SitemapEntry {
                    loc: "https://edge.example/docs/bar".into(),
                    lastmod: Some("2024-01-01".into()),
                },
                SitemapEntry {
                    loc: "https://edge.example/docs/baz".into(),
                    lastmod: None,
                },
            ]
        );
    }

    #[test]
    fn test_parse_without_urls_fails() {
        for xml in [
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"></urlset>"#,
            r#"<urlset/>"#,
            r#"<sitemapindex><sitemap><loc>https://edge.example/a.xml</loc></sitemap></sitemapindex>"#,
            "",
        ] {
            let err = parse_urlset(xml).unwrap_err();
            assert!(matches!(err, SyncError::Parse(_)), "{xml}");
        }
    }

    #[test]
    fn test_parse_malformed_xml_fails() {
        let err = parse_urlset("<urlset><url><loc>x</lo></url></urlset>").unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_object_path() {
        assert_eq!(sitemap_object_path("/blog/"), "blog/sitemap.xml");
        assert_eq!(sitemap_object_path("/"), "sitemap.xml");
        assert_eq!(sitemap_object_path(""), "sitemap.xml");
        assert_eq!(sitemap_object_path("a/b"), "a/b/sitemap.xml");
    }
}
