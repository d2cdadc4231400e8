mod compiler;
mod database;
mod discovery;
mod hashing;
mod types;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{
    ChallengeDef, DefDatabase, DefDatabaseBuilder, DropDef, EnemyDef, ItemDef, PlayerDef,
};
pub use types::{ContentLoadError, ContentRequest};
