use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use std::str;

use crate::errors::{Result, WebDAVError};
use crate::models::{DavResource, ResourceKind};

#[derive(Debug, Default)]
struct PropFindResponse {
    href: String,
    displayname: String,
    content_length: Option<u64>,
    creation_date: Option<String>,
    last_modified: Option<String>,
    content_type: Option<String>,
    etag: Option<String>,
    is_collection: bool,
}

impl PropFindResponse {
    fn into_resource(self) -> DavResource {
        let raw_name = if self.displayname.is_empty() {
            self.href
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or("")
                .to_string()
        } else {
            self.displayname
        };

        // Decode URL-encoded characters
        let name = urlencoding::decode(&raw_name)
            .map(|n| n.into_owned())
            .unwrap_or(raw_name);

        DavResource {
            href: self.href,
            path: String::new(),
            name,
            kind: if self.is_collection {
                ResourceKind::Directory
            } else {
                ResourceKind::File
            },
            created_at: self.creation_date.as_deref().and_then(parse_http_date),
            last_modified: self.last_modified.as_deref().and_then(parse_http_date),
            content_type: self.content_type,
            content_length: if self.is_collection { None } else { self.content_length },
            etag: self.etag,
        }
    }
}

/// Parses a PROPFIND multistatus body into resources, collections included.
///
/// Entries are returned in document order, which for Depth 1 means the
/// requested resource first. `path` is left empty; the URL manager fills it.
pub fn parse_propfind_response(xml_text: &str) -> Result<Vec<DavResource>> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut resources = Vec::new();
    let mut current_response: Option<PropFindResponse> = None;
    let mut current_element = String::new();
    let mut in_propstat = false;
    let mut in_resourcetype = false;
    let mut status_ok = false;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            // <resourcetype/> opens and closes in one event: a plain resource
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"resourcetype" => {}
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = get_local_name(&e)?;

                match name.as_str() {
                    "response" => {
                        current_response = Some(PropFindResponse::default());
                    }
                    "propstat" => {
                        in_propstat = true;
                    }
                    "resourcetype" => {
                        in_resourcetype = true;
                    }
                    "collection" if in_resourcetype => {
                        if let Some(ref mut resp) = current_response {
                            resp.is_collection = true;
                        }
                    }
                    _ => {
                        current_element = name;
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape()?.trim().to_string();

                if let Some(resp) = current_response.as_mut().filter(|_| !text.is_empty()) {
                    match current_element.as_str() {
                        "href" => resp.href = text,
                        "displayname" => resp.displayname = text,
                        "getcontentlength" => resp.content_length = text.parse().ok(),
                        "creationdate" => resp.creation_date = Some(text),
                        "getlastmodified" => resp.last_modified = Some(text),
                        "getcontenttype" => resp.content_type = Some(text),
                        "getetag" => resp.etag = Some(text),
                        "status" if in_propstat => {
                            if text.contains(" 200") {
                                status_ok = true;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = get_local_name_from_end(&e)?;

                match name.as_str() {
                    "response" => {
                        if let Some(resp) = current_response.take() {
                            if status_ok && !resp.href.is_empty() {
                                resources.push(resp.into_resource());
                            }
                        }
                        status_ok = false;
                    }
                    "propstat" => {
                        in_propstat = false;
                    }
                    "resourcetype" => {
                        in_resourcetype = false;
                    }
                    _ => {}
                }

                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(WebDAVError::xml(e.to_string())),
            _ => {}
        }

        buf.clear();
    }

    Ok(resources)
}

/// Extracts the lock token from a LOCK response body (`lockdiscovery/activelock/locktoken/href`)
pub fn parse_lock_token(xml_text: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut in_locktoken = false;
    let mut in_href = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match get_local_name(&e)?.as_str() {
                "locktoken" => in_locktoken = true,
                "href" if in_locktoken => in_href = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_href => {
                let token = e.unescape()?.trim().to_string();
                if !token.is_empty() {
                    return Ok(Some(token));
                }
            }
            Ok(Event::End(e)) => match get_local_name_from_end(&e)?.as_str() {
                "locktoken" => in_locktoken = false,
                "href" => in_href = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(WebDAVError::xml(e.to_string())),
            _ => {}
        }

        buf.clear();
    }

    Ok(None)
}

fn get_local_name(e: &BytesStart) -> Result<String> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|e| WebDAVError::xml(format!("Invalid UTF-8 in element name: {}", e)))?;
    Ok(name.to_string())
}

fn get_local_name_from_end(e: &BytesEnd) -> Result<String> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|e| WebDAVError::xml(format!("Invalid UTF-8 in element name: {}", e)))?;
    Ok(name.to_string())
}

/// getlastmodified is RFC 1123, creationdate is RFC 3339
pub(crate) fn parse_http_date(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            DateTime::parse_from_rfc3339(date_str)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        })
}
