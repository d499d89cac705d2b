pub mod analyze_media_use_case;
pub mod extract_directory_use_case;
pub mod extract_faces_use_case;
pub mod worker_pool;
