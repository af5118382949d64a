//! File names and column names of the raw dataset and its outputs.

/// Item metadata table
pub const ITEMS_FILE: &str = "anime.csv";
/// User/item interaction table
pub const RATINGS_FILE: &str = "rating_complete.csv";
/// Raw tables in the order they are loaded
pub const RAW_FILES: [&str; 2] = [ITEMS_FILE, RATINGS_FILE];
/// Documentation folder shipped inside the archive
pub const SUPPLEMENTARY_DIR: &str = "html folder";

pub mod items {
    pub const ID: &str = "MAL_ID";
    pub const NAME: &str = "Name";
    pub const GENRES: &str = "Genres";
    pub const SCORE: &str = "Score";
    pub const TYPE: &str = "Type";
}

pub mod ratings {
    pub const USER_ID: &str = "user_id";
    pub const ITEM_ID: &str = "anime_id";
    pub const RATING: &str = "rating";
}

/// Canonical joined column names, used as output headers
pub mod joined {
    pub const USER_ID: &str = "user_id";
    pub const ITEM_ID: &str = "anime_id";
    pub const ITEM_NAME: &str = "anime";
    pub const GENRES: &str = "genres";
}

/// Output artifact names inside the output directory
pub mod outputs {
    pub const DEFAULT_JOINED: &str = "anime-genre.csv";
    pub const DIMENSION: &str = "dimension.txt";
    pub const TRAIN_CSV: &str = "train.csv";
    pub const TEST_CSV: &str = "test.csv";
    pub const TRAIN_RECORDIO: &str = "train.protobuf";
    pub const TEST_RECORDIO: &str = "test.protobuf";
    pub const TRAIN_LIBSVM: &str = "train.libsvm";
    pub const TEST_LIBSVM: &str = "test.libsvm";
    pub const USER_LOOKUP: &str = "user_lookup.libsvm";
    pub const ITEM_LOOKUP: &str = "anime_lookup.libsvm";
    pub const MANIFEST: &str = "manifest.json";
}

/// Score placeholder used by the item table for unrated titles
pub const UNKNOWN_SCORE: &str = "Unknown";
