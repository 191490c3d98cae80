use super::prelude::*;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) kinds: Vec<KindOption>,
    pub(crate) enhancement_available: bool,
    pub(crate) version: &'static str,
}

#[derive(Clone, Debug)]
pub(crate) struct KindOption {
    pub(crate) value: &'static str,
    pub(crate) size: u32,
}

/// handles the / GET
pub(crate) async fn index_handler(State(state): State<AppState>) -> IndexTemplate {
    IndexTemplate {
        kinds: ImageKind::ALL
            .iter()
            .map(|kind| KindOption {
                value: kind.as_str(),
                size: state.config.output.target_size(*kind),
            })
            .collect(),
        enhancement_available: state.generator.enhancer().is_available(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

pub(crate) async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    (StatusCode::OK, [(CONTENT_TYPE, "text/css")], STYLES)
}
