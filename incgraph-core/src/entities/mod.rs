pub mod fragment;
pub mod vertex_map;
