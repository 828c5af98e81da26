use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Pagination parameters as received from a caller.
///
/// Values are kept signed and unchecked so that bad input survives until
/// `query::build`, which is the single place that rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub index: i64,
    pub size: i64,
}

impl PageRequest {
    pub fn new(index: i64, size: i64) -> Self {
        Self { index, size }
    }

    pub fn is_valid(&self) -> bool {
        self.index >= 0 && self.size > 0
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of a paginated upstream listing, in the Spring Data shape the
/// catalog API emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<serde_json::Value>,
    pub total_pages: u64,
    pub total_elements: u64,
    pub first: bool,
    pub last: bool,
    pub number_of_elements: u64,
    pub size: u64,
    pub number: u64,
}

impl<T> Page<T> {
    /// Build a page whose derived fields agree with `content`, `number`
    /// and `total_elements`.
    pub fn new(content: Vec<T>, number: u64, size: u64, total_elements: u64) -> Self {
        let total_pages = if size == 0 {
            u64::from(total_elements > 0)
        } else {
            total_elements.div_ceil(size)
        };
        Self {
            number_of_elements: content.len() as u64,
            content,
            sort: None,
            total_pages,
            total_elements,
            first: number == 0,
            last: total_pages == 0 || number + 1 >= total_pages,
            size,
            number,
        }
    }

    /// True when the element count and the `first`/`last` flags agree with
    /// the rest of the page. A page requested past the end is empty and
    /// reads as last.
    pub fn is_consistent(&self) -> bool {
        self.number_of_elements == self.content.len() as u64
            && self.first == (self.number == 0)
            && self.last == (self.total_pages == 0 || self.number + 1 >= self.total_pages)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
}

/// A blog entry. List and search responses are requested with
/// `excludeContent=true`, so `content` is blank everywhere except on a
/// fetch by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub entry_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub created: Author,
    #[serde(default)]
    pub updated: Author,
    #[serde(default)]
    pub front_matter: FrontMatter,
}

impl Entry {
    pub fn id(&self) -> i64 {
        self.entry_id
    }

    pub fn title(&self) -> &str {
        &self.front_matter.title
    }

    pub fn tags(&self) -> &[String] {
        &self.front_matter.tags
    }

    pub fn categories(&self) -> &[String] {
        &self.front_matter.categories
    }

    pub fn created_by(&self) -> &Author {
        &self.created
    }

    pub fn updated_by(&self) -> &Author {
        &self.updated
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_request_validity() {
        assert!(PageRequest::default().is_valid());
        assert_eq!(PageRequest::default().size, DEFAULT_PAGE_SIZE);
        assert!(!PageRequest::new(-1, 10).is_valid());
        assert!(!PageRequest::new(0, 0).is_valid());
    }

    #[test]
    fn page_new_derives_flags_and_counts() {
        let page = Page::new(vec!["a", "b"], 0, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.number_of_elements, 2);
        assert!(page.first);
        assert!(!page.last);
        assert!(page.is_consistent());

        let last = Page::new(vec!["e"], 2, 2, 5);
        assert!(!last.first);
        assert!(last.last);
        assert!(last.is_consistent());
    }

    #[test]
    fn wrong_last_flag_is_inconsistent() {
        let mut middle = Page::new(vec!["c", "d"], 1, 2, 5);
        assert!(middle.is_consistent());
        middle.last = true;
        assert!(!middle.is_consistent());

        let mut final_page = Page::new(vec!["e"], 2, 2, 5);
        final_page.last = false;
        assert!(!final_page.is_consistent());
    }

    #[test]
    fn page_past_the_end_reads_as_last() {
        let page: Page<&str> = Page::new(vec![], 7, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.last);
        assert!(page.is_consistent());
    }

    #[test]
    fn empty_page_is_first_and_last() {
        let page: Page<String> = Page::new(vec![], 0, 10, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.first);
        assert!(page.last);
        assert!(page.is_empty());
    }

    #[test]
    fn decodes_list_page_without_content() {
        let body = json!({
            "content": [{
                "entryId": 99,
                "created": { "name": "making", "date": "2017-04-02T12:00:00+09:00" },
                "updated": { "name": "making", "date": "2017-04-03T08:30:00+09:00" },
                "frontMatter": {
                    "title": "Hello",
                    "tags": ["Java", "Spring"],
                    "categories": ["Programming", "Java"]
                }
            }],
            "sort": null,
            "totalPages": 4,
            "totalElements": 31,
            "first": true,
            "last": false,
            "numberOfElements": 1,
            "size": 10,
            "number": 0
        });
        let page: Page<Entry> = serde_json::from_value(body).unwrap();
        assert!(page.is_consistent());
        let entry = &page.content[0];
        assert_eq!(entry.id(), 99);
        assert_eq!(entry.title(), "Hello");
        assert_eq!(entry.tags(), ["Java", "Spring"]);
        assert_eq!(entry.categories(), ["Programming", "Java"]);
        assert_eq!(entry.created_by().name, "making");
        assert!(entry.updated_by().date.is_some());
        assert!(entry.content.is_empty());
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let entry: Entry = serde_json::from_value(json!({
            "entryId": 1,
            "content": null,
            "frontMatter": { "title": "t", "tags": null, "categories": null }
        }))
        .unwrap();
        assert!(entry.content.is_empty());
        assert!(entry.tags().is_empty());
        assert!(entry.categories().is_empty());
    }

    #[test]
    fn mismatched_element_count_is_inconsistent() {
        let mut page = Page::new(vec![1, 2, 3], 0, 3, 3);
        page.number_of_elements = 2;
        assert!(!page.is_consistent());

        let mut page = Page::new(vec![1], 1, 1, 3);
        page.first = true;
        assert!(!page.is_consistent());
    }
}
