/// Local ledger store over `SeaORM`
pub mod local;
/// External sync store over a JSON export
pub mod external;

pub use external::JsonSnapshotStore;
pub use local::SeaOrmLocalStore;
