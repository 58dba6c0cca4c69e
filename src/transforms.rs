//! The transform library.
//!
//! Each transform takes a [`Dataset`](crate::dataset::Dataset) plus its
//! keyword arguments and returns a new dataset; inputs are never modified in
//! place. Failures name the step and the column or key involved.
//!
//! | Step                    | Purpose                                         |
//! |-------------------------|-------------------------------------------------|
//! | `set_df_index`          | promote the uid column to the row index         |
//! | `convert_to_str`        | render columns as text                          |
//! | `create_title_cat`      | extract the title from a name and code it       |
//! | `impute_age`            | fill missing ages from a per-title fallback     |
//! | `create_family_size`    | sum relation counts plus one                    |
//! | `drop_columns`          | remove columns                                  |
//! | `impute_missing_values` | fill remaining gaps per column                  |
//! | `scaler`                | min-max scale numeric columns                   |
//! | `one_hot_encoder`       | expand categoricals over a fixed vocabulary     |

pub mod columns;
pub mod encode;
pub mod features;
pub mod impute;
pub mod index;
pub mod scale;

pub use columns::{convert_to_str, drop_columns};
pub use encode::{OneHotColumn, one_hot_encoder};
pub use features::{create_family_size, create_title_cat};
pub use impute::{ImputeStrategy, impute_age, impute_missing_values};
pub use index::set_df_index;
pub use scale::scaler;

pub const SET_DF_INDEX: &str = "set_df_index";
pub const CONVERT_TO_STR: &str = "convert_to_str";
pub const CREATE_TITLE_CAT: &str = "create_title_cat";
pub const IMPUTE_AGE: &str = "impute_age";
pub const CREATE_FAMILY_SIZE: &str = "create_family_size";
pub const DROP_COLUMNS: &str = "drop_columns";
pub const IMPUTE_MISSING_VALUES: &str = "impute_missing_values";
pub const SCALER: &str = "scaler";
pub const ONE_HOT_ENCODER: &str = "one_hot_encoder";
