pub mod db;
pub mod generator_llm;
pub mod pdf_text;

pub use db::DbAdapter;
pub use generator_llm::OpenAiAssetAdapter;
pub use pdf_text::PdfTextAdapter;
