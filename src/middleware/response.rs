use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

/// Builds the `{ success, data | error }` envelope for one reply body.
pub fn envelope(status: StatusCode, is_json: bool, bytes: &[u8]) -> Value {
    if is_json {
        let data: Value = serde_json::from_slice(bytes).unwrap_or(Value::Null);

        // Already standardised (error replies carry their own envelope)
        if data.as_object().is_some_and(|obj| obj.contains_key("success")) {
            return data;
        }

        if status.is_success() {
            json!({ "success": true, "data": data })
        } else {
            let msg = data
                .as_str()
                .or_else(|| data.get("error").and_then(|v| v.as_str()))
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            json!({ "success": false, "error": msg })
        }
    } else {
        let msg = String::from_utf8_lossy(bytes).to_string();
        if status.is_success() {
            if msg.is_empty() {
                json!({ "success": true, "data": null })
            } else {
                json!({ "success": true, "data": msg })
            }
        } else {
            json!({
                "success": false,
                "error": if msg.is_empty() { status.to_string() } else { msg }
            })
        }
    }
}

pub async fn wrap_response_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    let wrap = req.uri().path().starts_with("/api");
    let res = next.run(req).await;
    if !wrap {
        return Ok(res);
    }

    let status = res.status();
    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let (mut parts, body) = res.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let new_bytes = serde_json::to_vec(&envelope(status, is_json, &bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(new_bytes.len()));

    Ok(Response::from_parts(parts, Body::from(new_bytes)))
}
