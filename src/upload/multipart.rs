//! `multipart/form-data` body with a single file part.

/// Encoded request body plus the boundary its content type announces.
#[derive(Clone, Debug)]
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    /// Build a body carrying one file. `field` is the form field name.
    pub fn single_file(field: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        Self::with_boundary(
            format!("------------------------{:016x}", rand::random::<u64>()),
            field,
            filename,
            content_type,
            bytes,
        )
    }

    fn with_boundary(
        boundary: String,
        field: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Self {
        let mut body = Vec::with_capacity(bytes.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quoted(field),
                escape_quoted(filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        Self { boundary, body }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}
