//! Gallery sort orders.

use core_library::models::MediaFile;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortType {
    DateAsc,
    #[default]
    DateDesc,
    NameAsc,
    NameDesc,
    Random,
}

impl SortType {
    pub const ALL: [SortType; 5] = [
        SortType::DateAsc,
        SortType::DateDesc,
        SortType::NameAsc,
        SortType::NameDesc,
        SortType::Random,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SortType::DateAsc => "date_asc",
            SortType::DateDesc => "date_desc",
            SortType::NameAsc => "name_asc",
            SortType::NameDesc => "name_desc",
            SortType::Random => "random",
        }
    }

    /// Unknown keys fall back to the default order.
    pub fn from_key(key: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|sort| sort.key() == key)
            .unwrap_or_default()
    }

    /// Sort in place. Descending orders are the exact reverse of their
    /// ascending counterpart; `Random` reshuffles on every call.
    pub fn apply(&self, files: &mut [MediaFile]) {
        match self {
            SortType::DateAsc => sort_by_date(files),
            SortType::DateDesc => {
                sort_by_date(files);
                files.reverse();
            }
            SortType::NameAsc => sort_by_name(files),
            SortType::NameDesc => {
                sort_by_name(files);
                files.reverse();
            }
            SortType::Random => files.shuffle(&mut rand::thread_rng()),
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn sort_by_date(files: &mut [MediaFile]) {
    files.sort_by_key(|file| file.info.last_modified);
}

fn sort_by_name(files: &mut [MediaFile]) {
    files.sort_by(|a, b| a.info.name.cmp(&b.info.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::models::{MediaType, NodeInfo};

    fn file(name: &str, last_modified: i64) -> MediaFile {
        MediaFile::new(
            NodeInfo {
                locator: String::new(),
                doc_id: name.to_string(),
                parent_doc_id: String::new(),
                root_locator: String::new(),
                name: name.to_string(),
                mime_type: "image/png".to_string(),
                size: 0,
                last_modified,
                path: String::new(),
            },
            MediaType::Image,
        )
    }

    fn names(files: &[MediaFile]) -> Vec<&str> {
        files.iter().map(|f| f.info.name.as_str()).collect()
    }

    fn sample() -> Vec<MediaFile> {
        vec![file("b", 3), file("a", 1), file("c", 2)]
    }

    #[test]
    fn test_date_orders() {
        let mut files = sample();
        SortType::DateAsc.apply(&mut files);
        assert_eq!(names(&files), vec!["a", "c", "b"]);

        SortType::DateDesc.apply(&mut files);
        assert_eq!(names(&files), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_name_orders() {
        let mut files = sample();
        SortType::NameAsc.apply(&mut files);
        assert_eq!(names(&files), vec!["a", "b", "c"]);

        SortType::NameDesc.apply(&mut files);
        assert_eq!(names(&files), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_descending_is_exact_reverse_with_ties() {
        let mut asc = vec![file("x", 1), file("y", 1), file("z", 0)];
        let mut desc = asc.clone();
        SortType::DateAsc.apply(&mut asc);
        SortType::DateDesc.apply(&mut desc);

        asc.reverse();
        assert_eq!(names(&asc), names(&desc));
    }

    #[test]
    fn test_random_is_a_permutation() {
        let mut files = sample();
        SortType::Random.apply(&mut files);

        let mut sorted = names(&files);
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_key_round_trip_and_default() {
        for sort in SortType::ALL {
            assert_eq!(SortType::from_key(sort.key()), sort);
        }
        assert_eq!(SortType::from_key("bogus"), SortType::DateDesc);
        assert_eq!(SortType::default(), SortType::DateDesc);
    }
}
