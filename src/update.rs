//! The dashboard's single reactive handler.
//!
//! Everything here is independent of egui: the UI collects an
//! [`UpdateInputs`] whenever a watched input changes, calls
//! [`update_output`] and renders whatever [`UpdateOutputs`] it gets back.

use crate::classify::{classification_chart, Classify, ClassifyError, ModelKind};
use crate::data::bitmap::LoadedImage;
use crate::data::prediction::{Chart, TopKRange};
use crate::data::remote::{FetchError, FetchImage};

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("could not decode the uploaded image: {0}")]
    Upload(#[source] image::ImageError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// Snapshot of the watched inputs plus the URL text field.
#[derive(Debug, Clone, Copy)]
pub struct UpdateInputs<'a> {
    /// Encoded bytes of the uploaded file, if any.
    pub upload: Option<&'a [u8]>,
    pub k: usize,
    pub model: ModelKind,
    /// Only a trigger; the value itself does not influence the result.
    pub submit_clicks: u64,
    pub url: &'a str,
}

/// What the dashboard currently shows.
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub image: LoadedImage,
    pub chart: Option<Chart>,
}

#[derive(Debug, Clone)]
pub struct UpdateOutputs {
    pub display: DisplayState,
    /// New content of the URL text field.
    pub url: String,
}

// ---------------------------------------------------------------------------
// Source selection
// ---------------------------------------------------------------------------

/// Where the next image comes from. Exactly one source per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    Upload(&'a [u8]),
    Remote(&'a str),
    Default,
}

impl<'a> ImageSource<'a> {
    /// Upload beats a non-blank URL, which beats the default image.
    pub fn choose(upload: Option<&'a [u8]>, url: &'a str) -> Self {
        if let Some(bytes) = upload {
            return ImageSource::Upload(bytes);
        }
        let url = url.trim();
        if !url.is_empty() {
            return ImageSource::Remote(url);
        }
        ImageSource::Default
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Shared, read-only collaborators of the handler.
pub struct Services<'a, C: ?Sized, F: ?Sized> {
    pub classifier: &'a C,
    pub fetcher: &'a F,
    pub default_image: &'a LoadedImage,
    pub top_k: TopKRange,
}

/// Compute the next display from the inputs and the previous display.
///
/// A failing URL is swallowed: the previous display is returned unchanged and
/// the URL field is cleared. Upload decoding and classification errors are
/// returned to the caller.
pub fn update_output<C, F>(
    inputs: UpdateInputs<'_>,
    previous: &DisplayState,
    services: &Services<'_, C, F>,
) -> Result<UpdateOutputs, UpdateError>
where
    C: Classify + ?Sized,
    F: FetchImage + ?Sized,
{
    let k = services.top_k.clamp(inputs.k);
    log::debug!(
        "Update: model {}, k {k}, submits {}",
        inputs.model.id(),
        inputs.submit_clicks
    );

    match ImageSource::choose(inputs.upload, inputs.url) {
        ImageSource::Upload(bytes) => {
            let image = previous
                .image
                .reuse_or_decode("upload", bytes)
                .map_err(UpdateError::Upload)?;
            let chart = classification_chart(services.classifier, &image.image, inputs.model, k)?;
            Ok(UpdateOutputs {
                display: DisplayState {
                    image,
                    chart: Some(chart),
                },
                url: String::new(),
            })
        }
        ImageSource::Remote(url) => {
            let image = match fetch_remote(services.fetcher, url, &previous.image) {
                Ok(image) => image,
                Err(err) => {
                    log::warn!("Ignoring remote image {url}: {err}");
                    return Ok(UpdateOutputs {
                        display: previous.clone(),
                        url: String::new(),
                    });
                }
            };
            let chart = classification_chart(services.classifier, &image.image, inputs.model, k)?;
            Ok(UpdateOutputs {
                display: DisplayState {
                    image,
                    chart: Some(chart),
                },
                url: inputs.url.to_string(),
            })
        }
        ImageSource::Default => {
            let chart = classification_chart(
                services.classifier,
                &services.default_image.image,
                inputs.model,
                k,
            )?;
            Ok(UpdateOutputs {
                display: DisplayState {
                    image: previous.image.clone(),
                    chart: Some(chart),
                },
                url: String::new(),
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RemoteError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("not a decodable image: {0}")]
    Decode(#[from] image::ImageError),
}

fn fetch_remote<F: FetchImage + ?Sized>(
    fetcher: &F,
    url: &str,
    shown: &LoadedImage,
) -> Result<LoadedImage, RemoteError> {
    let bytes = fetcher.fetch(url)?;
    Ok(shown.reuse_or_decode("remote", bytes)?)
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgb, RgbImage};

    use super::*;
    use crate::classify::testing::FakeClassifier;
    use crate::data::bitmap::encode_png;
    use crate::data::remote::testing::FakeFetcher;

    const URL: &str = "http://example.test/cat.png";

    /// PNG whose top-left red value steers the fake classifier.
    fn png(red: u8) -> Vec<u8> {
        encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 6, Rgb([red, 0, 0]))))
    }

    fn loaded(red: u8) -> LoadedImage {
        LoadedImage::decode("test", png(red)).unwrap()
    }

    fn inputs<'a>(upload: Option<&'a [u8]>, url: &'a str, model: ModelKind, k: usize) -> UpdateInputs<'a> {
        UpdateInputs {
            upload,
            k,
            model,
            submit_clicks: 0,
            url,
        }
    }

    fn top_label(out: &UpdateOutputs) -> &str {
        &out.display.chart.as_ref().unwrap().bars[0].label
    }

    struct Fixture {
        classifier: FakeClassifier,
        fetcher: FakeFetcher,
        default_image: LoadedImage,
        previous: DisplayState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                classifier: FakeClassifier::new(30),
                fetcher: FakeFetcher::with(URL, png(12)),
                default_image: loaded(1),
                previous: DisplayState {
                    image: loaded(20),
                    chart: None,
                },
            }
        }

        fn run(&self, inputs: UpdateInputs<'_>) -> Result<UpdateOutputs, UpdateError> {
            let services = Services {
                classifier: &self.classifier,
                fetcher: &self.fetcher,
                default_image: &self.default_image,
                top_k: TopKRange::default(),
            };
            update_output(inputs, &self.previous, &services)
        }
    }

    #[test]
    fn source_priority_is_upload_then_url_then_default() {
        let bytes = [1u8, 2, 3];
        assert_eq!(ImageSource::choose(Some(&bytes[..]), URL), ImageSource::Upload(&bytes[..]));
        assert_eq!(ImageSource::choose(None, URL), ImageSource::Remote(URL));
        assert_eq!(ImageSource::choose(None, "   "), ImageSource::Default);
        assert_eq!(ImageSource::choose(None, ""), ImageSource::Default);
    }

    #[test]
    fn upload_wins_over_populated_url() {
        let fx = Fixture::new();
        let upload = png(5);
        let out = fx.run(inputs(Some(upload.as_slice()), URL, ModelKind::Xception, 3)).unwrap();

        assert_eq!(top_label(&out), "class_5");
        assert_eq!(out.url, "");
        assert!(out.display.image.uri.starts_with("bytes://upload/"));
        assert!(fx.fetcher.requests.borrow().is_empty());
        assert_eq!(fx.classifier.calls.get(), 1);
    }

    #[test]
    fn url_is_fetched_classified_and_kept() {
        let fx = Fixture::new();
        let out = fx.run(inputs(None, URL, ModelKind::Xception, 4)).unwrap();

        assert_eq!(top_label(&out), "class_12");
        assert_eq!(out.display.chart.as_ref().unwrap().len(), 4);
        assert_eq!(out.url, URL);
        assert_eq!(*fx.fetcher.requests.borrow(), vec![URL.to_string()]);
    }

    #[test]
    fn unreachable_url_reverts_display_and_clears_field() {
        let mut fx = Fixture::new();
        let previous_chart = Chart::top_k(ModelKind::Vgg16, Vec::new(), 3);
        fx.previous.chart = Some(previous_chart.clone());

        let out = fx
            .run(inputs(None, "http://nowhere.test/x.png", ModelKind::Xception, 5))
            .unwrap();

        assert_eq!(out.url, "");
        assert_eq!(out.display.image.uri, fx.previous.image.uri);
        assert_eq!(out.display.chart, Some(previous_chart));
        assert_eq!(fx.classifier.calls.get(), 0);
    }

    #[test]
    fn malformed_remote_body_reverts_display() {
        let mut fx = Fixture::new();
        fx.fetcher = FakeFetcher::with(URL, b"<html>not an image</html>".to_vec());

        let out = fx.run(inputs(None, URL, ModelKind::Xception, 5)).unwrap();

        assert_eq!(out.url, "");
        assert_eq!(out.display.image.uri, fx.previous.image.uri);
        assert!(out.display.chart.is_none());
    }

    #[test]
    fn default_branch_replaces_chart_but_keeps_image() {
        let fx = Fixture::new();
        let out = fx.run(inputs(None, "", ModelKind::Xception, 5)).unwrap();

        let chart = out.display.chart.as_ref().unwrap();
        assert_eq!(chart.len(), 5);
        assert_eq!(chart.bars[0].label, "class_1");
        assert!(chart.bars.iter().map(|b| b.probability).sum::<f32>() <= 1.0 + 1e-6);
        assert_eq!(out.display.image.uri, fx.previous.image.uri);
        assert!(fx.fetcher.requests.borrow().is_empty());
    }

    #[test]
    fn switching_model_reclassifies_current_image() {
        let fx = Fixture::new();
        let upload = png(5);

        let first = fx.run(inputs(Some(upload.as_slice()), "", ModelKind::Xception, 3)).unwrap();
        let second = fx.run(inputs(Some(upload.as_slice()), "", ModelKind::ResNet50, 3)).unwrap();

        assert_eq!(top_label(&first), "class_5");
        assert_eq!(top_label(&second), "class_7");
        assert_eq!(second.display.chart.as_ref().unwrap().model, ModelKind::ResNet50);
    }

    #[test]
    fn unchanged_upload_keeps_its_image_across_updates() {
        let mut fx = Fixture::new();
        let upload = png(5);
        let first = fx.run(inputs(Some(upload.as_slice()), "", ModelKind::Xception, 3)).unwrap();

        fx.previous = first.display.clone();
        let second = fx.run(inputs(Some(upload.as_slice()), "", ModelKind::Xception, 9)).unwrap();

        assert_eq!(second.display.image.uri, first.display.image.uri);
        assert!(std::sync::Arc::ptr_eq(
            &second.display.image.image,
            &first.display.image.image
        ));
    }

    #[test]
    fn refetching_same_url_reuses_image_uri() {
        let mut fx = Fixture::new();
        let first = fx.run(inputs(None, URL, ModelKind::Xception, 3)).unwrap();
        fx.previous = first.display.clone();
        let second = fx.run(inputs(None, URL, ModelKind::Vgg16, 3)).unwrap();

        assert_eq!(fx.fetcher.requests.borrow().len(), 2);
        assert_eq!(second.display.image.uri, first.display.image.uri);
    }

    #[test]
    fn k_is_clamped_to_configured_range() {
        let fx = Fixture::new();
        let low = fx.run(inputs(None, "", ModelKind::Xception, 0)).unwrap();
        let high = fx.run(inputs(None, "", ModelKind::Xception, 1000)).unwrap();
        assert_eq!(low.display.chart.unwrap().len(), 3);
        assert_eq!(high.display.chart.unwrap().len(), 20);
    }

    #[test]
    fn corrupt_upload_is_reported() {
        let fx = Fixture::new();
        let err = fx
            .run(inputs(Some(&b"garbage"[..]), "", ModelKind::Xception, 3))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Upload(_)));
    }

    #[test]
    fn classification_errors_propagate() {
        let mut fx = Fixture::new();
        fx.classifier.unavailable = Some(ModelKind::Vgg16);
        let err = fx.run(inputs(None, "", ModelKind::Vgg16, 3)).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Classify(ClassifyError::ModelUnavailable(ModelKind::Vgg16))
        ));
    }
}
