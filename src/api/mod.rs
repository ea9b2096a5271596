pub mod gateway;
pub mod models;
pub mod supabase;

pub use gateway::*;
pub use models::*;
pub use supabase::*;
