mod checked_map;

pub use checked_map::CheckedMap;
