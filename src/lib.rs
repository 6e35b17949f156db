// pharma_report: sales reporting and customer segmentation over a pharmacy
// transaction export.
//
// The pipeline is load → prepare → filter → aggregate customers → segment
// (standardized Frequency/Monetary, seeded k-means) → attribute revenue
// back to clusters. `Session` ties the stages together and
// memoizes them per dataset, filter and cluster count.

pub mod attribution;
pub mod cli;
pub mod customers;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod output;
pub mod prep;
pub mod reports;
pub mod segment;
pub mod session;
pub mod types;
pub mod util;

pub use cli::Args;
pub use error::{Error, Result};
pub use filter::{FilterContext, FilterOptions};
pub use loader::{load_dataset, locate_dataset, LoadedDataset};
pub use prep::{prepare, prepare_with_report};
pub use segment::{fit_kmeans, segment, KMeansModel, Segmentation, SegmentationConfig};
pub use session::{SegmentationView, Session};
pub use types::{CustomerProfile, LabeledCustomer, TransactionTable};
