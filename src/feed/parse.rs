// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};

use crate::error::FeedError;

/// A parsed syndication document (RSS or Atom)
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}

/// One record of a syndication document
#[derive(Debug, Clone, Default)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub guid: String,
    pub description: Option<String>,
    pub links: Vec<String>,
    pub enclosures: Vec<Enclosure>,
    pub authors: Vec<Person>,
    pub published: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,
}

/// A file attached to an entry
#[derive(Debug, Clone, PartialEq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    pub length: Option<u64>,
}

/// An entry author or contributor
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub email: Option<String>,
}

/// Parse feed bytes as RSS 2.0, falling back to Atom
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument, FeedError> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(from_channel(&channel)),
        Err(rss) => match atom_syndication::Feed::read_from(bytes) {
            Ok(feed) => Ok(from_atom(&feed)),
            Err(atom) => Err(FeedError::ParseFailed { rss, atom }),
        },
    }
}

fn from_channel(channel: &rss::Channel) -> FeedDocument {
    FeedDocument {
        title: channel.title().to_string(),
        entries: channel.items().iter().map(rss_entry).collect(),
    }
}

fn rss_entry(item: &rss::Item) -> FeedEntry {
    let guid = item
        .guid()
        .map(|g| g.value().to_string())
        .or_else(|| item.link().map(String::from))
        .unwrap_or_default();

    let mut authors: Vec<Person> = item.author().map(parse_rss_person).into_iter().collect();
    if let Some(dc) = item.dublin_core_ext() {
        authors.extend(dc.creators().iter().map(|name| Person {
            name: name.clone(),
            email: None,
        }));
    }
    if authors.is_empty()
        && let Some(author) = item.itunes_ext().and_then(|ext| ext.author())
    {
        authors.push(Person {
            name: author.to_string(),
            email: None,
        });
    }

    let enclosures = item
        .enclosure()
        .map(|enc| Enclosure {
            url: enc.url().to_string(),
            mime_type: enc.mime_type().to_string(),
            length: enc.length().parse().ok(),
        })
        .into_iter()
        .collect();

    FeedEntry {
        title: item.title().map(String::from),
        guid,
        description: item
            .description()
            .or_else(|| item.content())
            .map(String::from),
        links: item.link().map(String::from).into_iter().collect(),
        enclosures,
        authors,
        published: item.pub_date().and_then(parse_date),
        updated: None,
    }
}

/// Split an RSS author of the form `email (Name)`
fn parse_rss_person(author: &str) -> Person {
    let author = author.trim();
    if let Some((email, rest)) = author.split_once(" (")
        && let Some(name) = rest.strip_suffix(')')
        && email.contains('@')
    {
        return Person {
            name: name.trim().to_string(),
            email: Some(email.trim().to_string()),
        };
    }
    Person {
        name: author.to_string(),
        email: None,
    }
}

fn from_atom(feed: &atom_syndication::Feed) -> FeedDocument {
    FeedDocument {
        title: feed.title().as_str().to_string(),
        entries: feed.entries().iter().map(atom_entry).collect(),
    }
}

fn atom_entry(entry: &atom_syndication::Entry) -> FeedEntry {
    let mut links = Vec::new();
    let mut enclosures = Vec::new();
    for link in entry.links() {
        if link.rel() == "enclosure" {
            enclosures.push(Enclosure {
                url: link.href().to_string(),
                mime_type: link.mime_type().unwrap_or_default().to_string(),
                length: link.length().and_then(|l| l.parse().ok()),
            });
        } else {
            links.push(link.href().to_string());
        }
    }

    let authors = entry
        .authors()
        .iter()
        .map(|p| Person {
            name: p.name().to_string(),
            email: p.email().map(String::from),
        })
        .collect();

    let description = entry.summary().map(|s| s.as_str().to_string()).or_else(|| {
        entry
            .content()
            .and_then(|c| c.value().map(|v| v.to_string()))
    });

    FeedEntry {
        title: Some(entry.title().as_str().to_string()).filter(|t| !t.is_empty()),
        guid: entry.id().to_string(),
        description,
        links,
        enclosures,
        authors,
        published: entry.published().copied(),
        updated: Some(*entry.updated()),
    }
}

/// Parse an RSS date, tolerating common deviations from RFC 2822
fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt);
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str.trim(), format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str.trim()).ok())
}
