//! Torznab XML parsing: caps documents and RSS search responses.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::types::{Candidate, SearchError};
use crate::store::IndexerCaps;

/// Parse a Torznab `t=caps` document.
pub fn parse_caps(xml: &[u8]) -> Result<(Option<String>, IndexerCaps), SearchError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut caps = IndexerCaps {
        search: false,
        ..Default::default()
    };
    let mut server_title: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match e.name().as_ref() {
                    b"server" => {
                        server_title = attr(&e, b"title");
                    }
                    b"limits" => {
                        caps.limits_max = attr(&e, b"max").and_then(|v| v.parse().ok());
                        caps.limits_default = attr(&e, b"default").and_then(|v| v.parse().ok());
                    }
                    b"search" => {
                        caps.search = available(&e);
                        collect_id_caps(&e, &mut caps);
                    }
                    b"tv-search" => {
                        caps.tv_search = available(&e);
                        collect_id_caps(&e, &mut caps);
                    }
                    b"movie-search" => {
                        caps.movie = available(&e);
                        collect_id_caps(&e, &mut caps);
                    }
                    b"music-search" => {
                        caps.music = available(&e);
                        collect_id_caps(&e, &mut caps);
                    }
                    b"audio-search" => {
                        caps.audio = available(&e);
                        collect_id_caps(&e, &mut caps);
                    }
                    b"book-search" => {
                        caps.book = available(&e);
                        collect_id_caps(&e, &mut caps);
                    }
                    b"category" => {
                        if let Some(id) = attr(&e, b"id") {
                            caps.cat_caps.push(id);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SearchError::Parse(e.to_string())),
        }
        buf.clear();
    }

    Ok((server_title, caps))
}

/// Parse an RSS-with-Torznab-extensions search response.
pub fn parse_search_results(xml: &[u8]) -> Result<Vec<Candidate>, SearchError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut items = Vec::new();
    let mut current: Option<PartialItem> = None;
    let mut text_target: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => current = Some(PartialItem::default()),
                b"title" if current.is_some() => text_target = Some(Field::Title),
                b"guid" if current.is_some() => text_target = Some(Field::Guid),
                b"link" if current.is_some() => text_target = Some(Field::Link),
                b"pubDate" if current.is_some() => text_target = Some(Field::PubDate),
                b"category" if current.is_some() => text_target = Some(Field::Category),
                b"size" if current.is_some() => text_target = Some(Field::Size),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if let Some(item) = current.as_mut() {
                    match e.name().as_ref() {
                        b"torznab:attr" | b"newznab:attr" => {
                            let name = attr(&e, b"name").unwrap_or_default();
                            let value = attr(&e, b"value").unwrap_or_default();
                            item.apply_attr(&name, &value);
                        }
                        b"enclosure" => {
                            if item.link.is_none() {
                                item.link = attr(&e, b"url");
                            }
                            if item.size.is_none() {
                                item.size = attr(&e, b"length").and_then(|v| v.parse().ok());
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(field)) = (current.as_mut(), text_target) {
                    let text = t.unescape().map_err(|e| SearchError::Parse(e.to_string()))?;
                    item.apply_text(field, text.trim());
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" => {
                    if let Some(item) = current.take() {
                        if let Some(candidate) = item.finish() {
                            items.push(candidate);
                        }
                    }
                }
                _ => text_target = None,
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SearchError::Parse(e.to_string())),
        }
        buf.clear();
    }

    Ok(items)
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Guid,
    Link,
    PubDate,
    Category,
    Size,
}

#[derive(Default)]
struct PartialItem {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    size: Option<u64>,
    pub_date: Option<DateTime<Utc>>,
    info_hash: Option<String>,
    categories: Vec<String>,
    seeders: Option<u32>,
}

impl PartialItem {
    fn apply_text(&mut self, field: Field, text: &str) {
        if text.is_empty() {
            return;
        }
        match field {
            Field::Title => self.title = Some(text.to_string()),
            Field::Guid => self.guid = Some(text.to_string()),
            Field::Link => self.link = Some(text.to_string()),
            Field::PubDate => self.pub_date = parse_pub_date(text),
            Field::Category => self.categories.push(text.to_string()),
            Field::Size => {
                if self.size.is_none() {
                    self.size = text.parse().ok();
                }
            }
        }
    }

    fn apply_attr(&mut self, name: &str, value: &str) {
        match name {
            "size" => self.size = value.parse().ok(),
            "infohash" => self.info_hash = Some(value.to_string()),
            "seeders" => self.seeders = value.parse().ok(),
            "guid" => {
                if self.guid.is_none() {
                    self.guid = Some(value.to_string());
                }
            }
            "category" => self.categories.push(value.to_string()),
            _ => {}
        }
    }

    fn finish(self) -> Option<Candidate> {
        let title = self.title?;
        let guid = self.guid.clone().or_else(|| self.link.clone())?;
        Some(Candidate {
            title,
            guid,
            link: self.link,
            size: self.size,
            pub_date: self.pub_date,
            info_hash: self.info_hash.and_then(|h| h.parse().ok()),
            categories: self.categories,
            seeders: self.seeders,
        })
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| String::from_utf8(a.value.into_owned()).ok())
}

fn available(e: &BytesStart) -> bool {
    attr(e, b"available").map(|v| v == "yes").unwrap_or(false)
}

fn collect_id_caps(e: &BytesStart, caps: &mut IndexerCaps) {
    if let Some(params) = attr(e, b"supportedParams") {
        for param in params.split(',') {
            let param = param.trim();
            if param.ends_with("id") && !caps.id_caps.iter().any(|p| p == param) {
                caps.id_caps.push(param.to_string());
            }
        }
    }
}

/// RSS pubDate is RFC 2822; some indexers emit ISO 8601 instead.
fn parse_pub_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })
}
