use axum::{
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use shared::view::{ViewModel, ViewSelection, ViewTarget};

#[derive(Serialize)]
struct RenderedView {
    view: String,
    attributes: ViewModel,
}

/// Templates are handed over as JSON; redirects become `303 See Other`.
pub(crate) fn render(selection: ViewSelection) -> Response {
    match selection.target {
        ViewTarget::Template(view) => Json(RenderedView {
            view,
            attributes: selection.attributes,
        })
        .into_response(),
        ViewTarget::Redirect(location) => Redirect::to(&location).into_response(),
    }
}
