//! Join and normalize stage
//!
//! ```text
//! SELECT rate.rating, rate.user_id, rate.anime_id, anm.Name, anm.Genres, anm.Score
//! FROM ratings rate
//! INNER JOIN anime anm ON rate.anime_id = anm.MAL_ID
//! ```

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::errors::{PipelineError, Result};
use crate::schema::{items, ratings, UNKNOWN_SCORE};
use crate::table::RawTable;

/// One joined rating row.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRecord {
    pub rating: f32,
    pub user_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub genres: String,
    /// Item score; `None` when the source marks it `Unknown`
    pub score: Option<f32>,
}

/// Joined table, rows in ratings-file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinedTable {
    pub records: Vec<JoinedRecord>,
}

impl JoinedTable {
    pub fn new(records: Vec<JoinedRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unique_users(&self) -> BTreeSet<i64> {
        self.records.iter().map(|r| r.user_id).collect()
    }

    pub fn unique_items(&self) -> BTreeSet<i64> {
        self.records.iter().map(|r| r.item_id).collect()
    }

    /// Width of the one-hot feature space: distinct users plus distinct items.
    pub fn feature_dimension(&self) -> usize {
        self.unique_users().len() + self.unique_items().len()
    }
}

#[derive(Debug)]
struct ItemRow {
    name: String,
    genres: String,
    score: Option<f32>,
}

/// Inner-join `ratings` onto `items`.
///
/// When `type_filter` is set, items whose type column differs are dropped
/// before the join, so their ratings never survive it.
pub fn join(items: &RawTable, ratings: &RawTable, type_filter: Option<&str>) -> Result<JoinedTable> {
    info!("Join Tables @on_job_start");

    let item_index = index_items(items, type_filter)?;

    let user_col = ratings.column(ratings::USER_ID)?;
    let item_col = ratings.column(ratings::ITEM_ID)?;
    let rating_col = ratings.column(ratings::RATING)?;

    let mut records = Vec::new();
    for row in 0..ratings.len() {
        let item_id = parse_int(ratings, row, item_col)?;
        let Some(matches) = item_index.get(&item_id) else {
            continue;
        };

        let user_id = parse_int(ratings, row, user_col)?;
        let rating = parse_rating(ratings, row, rating_col)?;

        for item in matches {
            records.push(JoinedRecord {
                rating,
                user_id,
                item_id,
                item_name: item.name.clone(),
                genres: item.genres.clone(),
                score: item.score,
            });
        }
    }

    debug!("Total records: {}", thousands(records.len()));
    info!("Join Tables @on_job_end");
    Ok(JoinedTable::new(records))
}

fn index_items(items: &RawTable, type_filter: Option<&str>) -> Result<HashMap<i64, Vec<ItemRow>>> {
    let id_col = items.column(items::ID)?;
    let name_col = items.column(items::NAME)?;
    let genres_col = items.column(items::GENRES)?;
    let score_col = items.column(items::SCORE)?;
    let type_col = match type_filter {
        Some(_) => Some(items.column(items::TYPE)?),
        None => None,
    };

    let mut index: HashMap<i64, Vec<ItemRow>> = HashMap::new();
    let mut filtered_out = 0usize;
    for row in 0..items.len() {
        if let (Some(col), Some(wanted)) = (type_col, type_filter) {
            if items.cell(row, col) != wanted {
                filtered_out += 1;
                continue;
            }
        }

        let id = parse_int(items, row, id_col)?;
        index.entry(id).or_default().push(ItemRow {
            name: items.cell(row, name_col).to_string(),
            genres: items.cell(row, genres_col).to_string(),
            score: parse_score(items, row, score_col)?,
        });
    }

    if let Some(wanted) = type_filter {
        debug!("Type filter '{}' dropped {} items", wanted, filtered_out);
    }
    Ok(index)
}

fn parse_int(table: &RawTable, row: usize, col: usize) -> Result<i64> {
    let raw = table.cell(row, col);
    raw.parse::<i64>().map_err(|_| {
        PipelineError::Load(format!(
            "{} row {}: invalid identifier '{}'",
            table.name,
            row + 1,
            raw
        ))
    })
}

fn parse_rating(table: &RawTable, row: usize, col: usize) -> Result<f32> {
    let raw = table.cell(row, col);
    // Parsed wide then narrowed, matching a float64 -> float32 cast.
    raw.parse::<f64>().map(|v| v as f32).map_err(|_| {
        PipelineError::Load(format!("{} row {}: invalid rating '{}'", table.name, row + 1, raw))
    })
}

fn parse_score(table: &RawTable, row: usize, col: usize) -> Result<Option<f32>> {
    let raw = table.cell(row, col);
    if raw.is_empty() || raw == UNKNOWN_SCORE {
        return Ok(None);
    }
    raw.parse::<f32>().map(Some).map_err(|_| {
        PipelineError::Load(format!("{} row {}: invalid score '{}'", table.name, row + 1, raw))
    })
}

/// `1234567` -> `1_234_567`
fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('_');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tables(items_csv: &str, ratings_csv: &str) -> (TempDir, RawTable, RawTable) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("anime.csv"), items_csv).unwrap();
        fs::write(tmp.path().join("ratings.csv"), ratings_csv).unwrap();
        let items = RawTable::from_csv(tmp.path().join("anime.csv")).unwrap();
        let ratings = RawTable::from_csv(tmp.path().join("ratings.csv")).unwrap();
        (tmp, items, ratings)
    }

    const ITEMS: &str = "MAL_ID,Name,Score,Genres,Type\n\
        1,Cowboy Bebop,8.78,\"Action, Sci-Fi\",TV\n\
        5,Bebop Movie,8.39,Action,Movie\n\
        6,Trigun,Unknown,Action,TV\n";

    const RATINGS: &str = "user_id,anime_id,rating\n\
        10,1,9\n\
        10,99,3\n\
        11,5,7\n\
        12,6,8\n";

    #[test]
    fn test_inner_join_drops_unmatched() {
        let (_tmp, items, ratings) = tables(ITEMS, RATINGS);
        let joined = join(&items, &ratings, None).unwrap();

        assert_eq!(joined.len(), 3);
        let first = &joined.records[0];
        assert_eq!(first.user_id, 10);
        assert_eq!(first.item_id, 1);
        assert_eq!(first.item_name, "Cowboy Bebop");
        assert_eq!(first.genres, "Action, Sci-Fi");
        assert_eq!(first.rating, 9.0f32);
        assert_eq!(first.score, Some(8.78));
        assert_eq!(joined.records[2].score, None);
    }

    #[test]
    fn test_type_filter_applies_before_join() {
        let (_tmp, items, ratings) = tables(ITEMS, RATINGS);
        let joined = join(&items, &ratings, Some("TV")).unwrap();

        assert_eq!(joined.len(), 2);
        assert!(joined.records.iter().all(|r| r.item_id != 5));
    }

    #[test]
    fn test_feature_dimension() {
        let (_tmp, items, ratings) = tables(ITEMS, RATINGS);
        let joined = join(&items, &ratings, None).unwrap();
        // users {10, 11, 12} + items {1, 5, 6}
        assert_eq!(joined.feature_dimension(), 6);
    }

    #[test]
    fn test_missing_column() {
        let (_tmp, items, ratings) = tables("MAL_ID,Name\n1,A\n", RATINGS);
        assert!(matches!(join(&items, &ratings, None), Err(PipelineError::Load(_))));
    }

    #[test]
    fn test_bad_rating() {
        let (_tmp, items, ratings) = tables(ITEMS, "user_id,anime_id,rating\n10,1,high\n");
        assert!(matches!(join(&items, &ratings, None), Err(PipelineError::Load(_))));
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1_000");
        assert_eq!(thousands(57_633_278), "57_633_278");
    }
}
