/// Data layer: images in, ranked predictions out.
///
/// Architecture:
/// ```text
///  upload bytes / URL / bundled default
///        │
///        ▼
///   ┌──────────┐
///   │  remote   │  HTTP GET → bytes (URL branch only)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  bitmap   │  decode → LoadedImage (bytes + pixels + uri)
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ prediction │  Vec<Prediction> → top-K Chart
///   └────────────┘
/// ```

pub mod bitmap;
pub mod prediction;
pub mod remote;
