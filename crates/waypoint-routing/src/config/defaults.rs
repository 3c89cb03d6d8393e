//! Default router option values

pub struct RouterDefaults;

impl RouterDefaults {
    pub const LOWERCASE_URLS: bool = false;
    pub const LOWERCASE_QUERY_STRINGS: bool = false;
    pub const APPEND_TRAILING_SLASH: bool = false;
    pub const POOL_CAPACITY: usize = 64;
    pub const MAX_RETAINED_BUFFER: usize = 4096;
}
