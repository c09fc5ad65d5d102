// Version information for txtvec

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// C ABI revision of the engine exports (`txtvec_process_strings`,
/// `txtvec_free_matrix`)
pub const ENGINE_ABI_VERSION: u32 = 1;
