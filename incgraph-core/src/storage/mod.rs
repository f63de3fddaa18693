pub mod vertex_array;
pub mod vertex_set;
