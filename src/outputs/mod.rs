//! Snapshot output.
//!
//! Every source writes one pretty-printed UTF-8 JSON file into the output
//! directory (default `data/`). A run fully replaces the previous file.
//!
//! ```text
//! data/
//! ├── bbc-trends.json
//! ├── google-trends.json
//! ├── komica-trends.json
//! ├── ptt-trends.json
//! ├── reddit-all-hot.json
//! ├── reddit-taiwanese-hot.json
//! └── reddit-china-irl-hot.json
//! ```

pub mod json;
