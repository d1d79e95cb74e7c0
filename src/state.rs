use std::sync::Arc;

use crate::classify::{Classify, ClassifyError, ModelKind};
use crate::config::DashConfig;
use crate::data::bitmap::LoadedImage;
use crate::data::prediction::TopKRange;
use crate::data::remote::FetchImage;
use crate::update::{update_output, DisplayState, Services, UpdateInputs};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A file the user opened or dropped onto the window.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Slider bounds.
    pub top_k: TopKRange,

    /// Uploaded image (None until the user opens or drops a file).
    pub upload: Option<Upload>,

    /// Content of the URL text field.
    pub url: String,

    /// Selected architecture.
    pub model: ModelKind,

    /// Slider value.
    pub k: usize,

    /// Number of submit clicks so far.
    pub submit_clicks: u64,

    /// Image and chart currently on screen.
    pub display: DisplayState,

    /// Classified whenever neither an upload nor a URL is given.
    pub default_image: LoadedImage,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// A watched input changed since the last update.
    dirty: bool,
}

impl AppState {
    pub fn new(config: &DashConfig, default_image: LoadedImage) -> Result<Self, ClassifyError> {
        Ok(Self {
            top_k: config.top_k,
            upload: None,
            url: String::new(),
            model: config.model()?,
            k: config.top_k.initial,
            submit_clicks: 0,
            display: DisplayState {
                image: default_image.clone(),
                chart: None,
            },
            default_image,
            status_message: None,
            // The first frame fills in the initial chart.
            dirty: true,
        })
    }

    /// Flag that a watched input changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_upload(&mut self, name: String, bytes: impl Into<Arc<[u8]>>) {
        log::info!("Uploaded {name}");
        self.upload = Some(Upload {
            name,
            bytes: bytes.into(),
        });
        self.mark_dirty();
    }

    pub fn clear_upload(&mut self) {
        if self.upload.take().is_some() {
            self.mark_dirty();
        }
    }

    pub fn submit(&mut self) {
        self.submit_clicks += 1;
        self.mark_dirty();
    }

    pub fn set_model(&mut self, model: ModelKind) {
        if self.model != model {
            self.model = model;
            self.mark_dirty();
        }
    }

    /// Run the reactive handler if any watched input changed.
    pub fn refresh_if_dirty<C, F>(&mut self, classifier: &C, fetcher: &F)
    where
        C: Classify + ?Sized,
        F: FetchImage + ?Sized,
    {
        if std::mem::take(&mut self.dirty) {
            self.refresh(classifier, fetcher);
        }
    }

    /// Recompute the display from the current inputs.
    pub fn refresh<C, F>(&mut self, classifier: &C, fetcher: &F)
    where
        C: Classify + ?Sized,
        F: FetchImage + ?Sized,
    {
        let inputs = UpdateInputs {
            upload: self.upload.as_ref().map(|u| &u.bytes[..]),
            k: self.k,
            model: self.model,
            submit_clicks: self.submit_clicks,
            url: &self.url,
        };
        let services = Services {
            classifier,
            fetcher,
            default_image: &self.default_image,
            top_k: self.top_k,
        };

        match update_output(inputs, &self.display, &services) {
            Ok(outputs) => {
                self.display = outputs.display;
                self.url = outputs.url;
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Update failed: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgb, RgbImage};

    use super::*;
    use crate::classify::testing::FakeClassifier;
    use crate::data::bitmap::encode_png;
    use crate::data::remote::testing::FakeFetcher;

    fn png(red: u8) -> Vec<u8> {
        encode_png(&DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([red, 0, 0]))))
    }

    fn state() -> AppState {
        let default_image = LoadedImage::decode("default", png(2)).unwrap();
        AppState::new(&DashConfig::default(), default_image).unwrap()
    }

    #[test]
    fn first_refresh_charts_default_image() {
        let mut st = state();
        let classifier = FakeClassifier::new(25);
        assert!(st.is_dirty());

        st.refresh_if_dirty(&classifier, &FakeFetcher::default());

        assert!(!st.is_dirty());
        let chart = st.display.chart.as_ref().unwrap();
        assert_eq!(chart.len(), 5);
        assert_eq!(chart.model, ModelKind::Xception);
        assert_eq!(chart.bars[0].label, "class_2");
    }

    #[test]
    fn clean_state_does_not_reclassify() {
        let mut st = state();
        let classifier = FakeClassifier::new(25);
        let fetcher = FakeFetcher::default();
        st.refresh_if_dirty(&classifier, &fetcher);
        st.refresh_if_dirty(&classifier, &fetcher);
        assert_eq!(classifier.calls.get(), 1);
    }

    #[test]
    fn upload_then_clear_returns_to_default_chart() {
        let mut st = state();
        let classifier = FakeClassifier::new(25);
        let fetcher = FakeFetcher::default();

        st.set_upload("cat.png".into(), png(9));
        st.refresh_if_dirty(&classifier, &fetcher);
        assert_eq!(st.display.chart.as_ref().unwrap().bars[0].label, "class_9");
        let uploaded_uri = st.display.image.uri.clone();

        st.clear_upload();
        assert!(st.is_dirty());
        st.refresh_if_dirty(&classifier, &fetcher);
        assert_eq!(st.display.chart.as_ref().unwrap().bars[0].label, "class_2");
        assert_eq!(st.display.image.uri, uploaded_uri);
    }

    #[test]
    fn submit_with_bad_url_clears_field_only() {
        let mut st = state();
        let classifier = FakeClassifier::new(25);
        let fetcher = FakeFetcher::default();
        st.refresh_if_dirty(&classifier, &fetcher);
        let before = st.display.clone();

        st.url = "http://down.test/a.png".into();
        st.submit();
        st.refresh_if_dirty(&classifier, &fetcher);

        assert_eq!(st.submit_clicks, 1);
        assert_eq!(st.url, "");
        assert_eq!(st.display.image.uri, before.image.uri);
        assert_eq!(st.display.chart, before.chart);
        assert!(st.status_message.is_none());
    }

    #[test]
    fn slider_moves_on_one_upload_keep_a_single_image_uri() {
        let mut st = state();
        let classifier = FakeClassifier::new(25);
        let fetcher = FakeFetcher::default();
        st.set_upload("cat.png".into(), png(9));

        let mut uris = std::collections::HashSet::new();
        for k in 3..=20 {
            st.k = k;
            st.mark_dirty();
            st.refresh_if_dirty(&classifier, &fetcher);
            uris.insert(st.display.image.uri.clone());
        }

        assert_eq!(uris.len(), 1);
        assert_eq!(st.display.chart.as_ref().unwrap().len(), 20);
    }

    #[test]
    fn selecting_same_model_is_not_a_change() {
        let mut st = state();
        st.refresh_if_dirty(&FakeClassifier::new(5), &FakeFetcher::default());
        st.set_model(ModelKind::Xception);
        assert!(!st.is_dirty());
        st.set_model(ModelKind::Vgg16);
        assert!(st.is_dirty());
    }

    #[test]
    fn failed_update_keeps_display_and_sets_status() {
        let mut st = state();
        let mut classifier = FakeClassifier::new(25);
        let fetcher = FakeFetcher::default();
        st.refresh_if_dirty(&classifier, &fetcher);
        let before = st.display.clone();

        classifier.unavailable = Some(ModelKind::ResNet50);
        st.set_model(ModelKind::ResNet50);
        st.refresh_if_dirty(&classifier, &fetcher);

        assert_eq!(st.display.chart, before.chart);
        assert!(st.status_message.as_deref().unwrap().contains("no weights"));
    }
}
