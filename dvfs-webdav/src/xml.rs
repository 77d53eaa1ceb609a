//! PROPFIND multistatus parsing

use dvfs_cache::DavEntry;
use dvfs_core::{VfsError, VfsResult};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::dates::{parse_http_datetime, parse_rfc3339};
use crate::path::uri_unescape;

// Text-bearing property the parser is currently inside.
#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Href,
    ContentLength,
    CreationDate,
    LastModified,
}

#[derive(Default)]
struct RawResponse {
    href: String,
    content_length: String,
    creation_date: String,
    last_modified: String,
    is_collection: bool,
}

impl RawResponse {
    fn into_entry(self) -> Option<DavEntry> {
        let name = uri_unescape(&self.href);
        if name.is_empty() {
            return None;
        }
        Some(DavEntry {
            name,
            size: self.content_length.trim().parse().ok(),
            created: parse_rfc3339(self.creation_date.trim()),
            modified: parse_http_datetime(self.last_modified.trim()),
            is_directory: self.is_collection,
        })
    }
}

/// Parses a `multistatus` reply into entries keyed by their raw href path.
///
/// Namespace prefixes vary between servers, so elements are matched by
/// local name only. Responses without an href are dropped; a reply that is
/// not well-formed XML is an invalid-argument error.
pub(crate) fn parse_multistatus(xml: &str) -> VfsResult<Vec<DavEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<RawResponse> = None;
    let mut field = Field::None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = start.name();
                match name.local_name().as_ref() {
                    b"response" => {
                        current = Some(RawResponse::default());
                        field = Field::None;
                    }
                    b"href" => field = Field::Href,
                    b"getcontentlength" => field = Field::ContentLength,
                    b"creationdate" => field = Field::CreationDate,
                    b"getlastmodified" => field = Field::LastModified,
                    b"collection" => {
                        if let Some(response) = current.as_mut() {
                            response.is_collection = true;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(empty)) => {
                if empty.name().local_name().as_ref() == b"collection" {
                    if let Some(response) = current.as_mut() {
                        response.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(response) = current.as_mut() {
                    let value = text
                        .unescape()
                        .map_err(|e| VfsError::InvalidArgument(format!("bad multistatus: {e}")))?;
                    match field {
                        Field::Href => response.href.push_str(&value),
                        Field::ContentLength => response.content_length.push_str(&value),
                        Field::CreationDate => response.creation_date.push_str(&value),
                        Field::LastModified => response.last_modified.push_str(&value),
                        Field::None => {}
                    }
                }
            }
            Ok(Event::End(end)) => {
                match end.name().local_name().as_ref() {
                    b"response" => {
                        if let Some(entry) = current.take().and_then(RawResponse::into_entry) {
                            items.push(entry);
                        }
                    }
                    b"href" | b"getcontentlength" | b"creationdate" | b"getlastmodified" => {
                        field = Field::None;
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(VfsError::InvalidArgument(format!("bad multistatus: {e}")));
            }
        }
    }

    Ok(items)
}

/// Extracts `(available, used)` from a quota PROPFIND reply. Unknown or
/// negative values come back as `None`.
pub(crate) fn parse_space_quota(xml: &str) -> (Option<u64>, Option<u64>) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut available: Option<u64> = None;
    let mut used: Option<u64> = None;
    let mut target: Option<bool> = None; // true = available, false = used

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => match start.name().local_name().as_ref() {
                b"quota-available-bytes" => target = Some(true),
                b"quota-used-bytes" => target = Some(false),
                _ => {}
            },
            Ok(Event::Text(text)) => {
                if let Some(is_available) = target {
                    let parsed = text
                        .unescape()
                        .ok()
                        .and_then(|value| value.trim().parse::<i64>().ok())
                        .and_then(|value| u64::try_from(value).ok());
                    if is_available {
                        available = parsed;
                    } else {
                        used = parsed;
                    }
                }
            }
            Ok(Event::End(_)) => target = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    (available, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    const APACHE_LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response xmlns:lp1="DAV:">
    <D:href>/base/docs/</D:href>
    <D:propstat>
      <D:prop>
        <lp1:resourcetype><D:collection/></lp1:resourcetype>
        <lp1:creationdate>2024-03-02T15:44:46Z</lp1:creationdate>
        <lp1:getlastmodified>Sat, 02 Mar 2024 15:44:46 GMT</lp1:getlastmodified>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response xmlns:lp1="DAV:">
    <D:href>/base/docs/report%20final.txt</D:href>
    <D:propstat>
      <D:prop>
        <lp1:resourcetype/>
        <lp1:creationdate>2024-03-01T10:00:00Z</lp1:creationdate>
        <lp1:getcontentlength>486</lp1:getcontentlength>
        <lp1:getlastmodified>Fri, 01 Mar 2024 10:00:00 GMT</lp1:getlastmodified>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;

    #[test]
    fn test_parse_listing() {
        let items = parse_multistatus(APACHE_LISTING).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].name, "/base/docs/");
        assert!(items[0].is_directory);
        assert_eq!(items[0].size, None);
        assert!(items[0].created.is_some());
        assert!(items[0].modified.is_some());

        assert_eq!(items[1].name, "/base/docs/report final.txt");
        assert!(!items[1].is_directory);
        assert_eq!(items[1].size, Some(486));
    }

    #[test]
    fn test_uppercase_prefix_is_accepted() {
        let xml = r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/x/</D:href>
    <D:propstat><D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop></D:propstat>
  </D:response>
</D:multistatus>"#;
        let items = parse_multistatus(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_directory);
    }

    #[test]
    fn test_response_without_href_is_dropped() {
        let xml = r#"<multistatus xmlns="DAV:"><response></response></multistatus>"#;
        assert!(parse_multistatus(xml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let result = parse_multistatus("<multistatus><response></multistatus>");
        assert!(matches!(result, Err(VfsError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_space_quota() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/</d:href>
    <d:propstat>
      <d:prop>
        <d:quota-available-bytes>1073741824</d:quota-available-bytes>
        <d:quota-used-bytes>536870912</d:quota-used-bytes>
      </d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        assert_eq!(
            parse_space_quota(xml),
            (Some(1_073_741_824), Some(536_870_912))
        );
    }

    #[test]
    fn test_quota_unknown_values() {
        let xml = r#"<d:multistatus xmlns:d="DAV:">
  <d:response><d:href>/</d:href>
    <d:propstat><d:prop><d:quota-available-bytes>-1</d:quota-available-bytes></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;
        assert_eq!(parse_space_quota(xml), (None, None));
    }
}
