//! Form body encoders
//!
//! Two encodings share the client's dispatch path: `multipart/form-data`
//! for mixed fields and files, and `application/x-www-form-urlencoded` for
//! plain string pairs.

use bytes::Bytes;
use std::fmt;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::MULTIPART_FORM_DATA;
use crate::{Error, NetworkErrorKind, Result};

/// Content type of file parts
const FILE_CONTENT_TYPE: &str = "application/octet-stream";

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte source for one multipart field
///
/// Sources with a file name are sent as file parts; everything else is an
/// ordinary field. A source is consumed by encoding and released right after
/// it has been read, whether or not the whole form succeeds.
pub enum FormSource {
    /// In-memory field value
    Field(Bytes),
    /// Reader sent as an ordinary field
    Reader(BoxReader),
    /// Reader sent as a file part
    File {
        /// File name reported in the part's `Content-Disposition`
        file_name: String,
        /// File contents
        reader: BoxReader,
    },
}

impl FormSource {
    /// Text field
    pub fn text(value: impl Into<String>) -> Self {
        FormSource::Field(Bytes::from(value.into()))
    }

    /// Raw bytes field
    pub fn bytes(value: impl Into<Bytes>) -> Self {
        FormSource::Field(value.into())
    }

    /// Ordinary field read from an async reader
    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        FormSource::Reader(Box::new(reader))
    }

    /// File part read from an async reader
    pub fn file(file_name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        FormSource::File { file_name: file_name.into(), reader: Box::new(reader) }
    }

    /// Open a file on disk as a file part named after the path
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            Error::network_with_source(
                NetworkErrorKind::Io,
                format!("failed to open {}", path.display()),
                e,
            )
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(FormSource::file(file_name, file))
    }

    /// File name when this is a file part
    pub fn file_name(&self) -> Option<&str> {
        match self {
            FormSource::File { file_name, .. } => Some(file_name),
            _ => None,
        }
    }

    async fn read_all(self) -> std::io::Result<Bytes> {
        match self {
            FormSource::Field(bytes) => Ok(bytes),
            FormSource::Reader(mut reader) | FormSource::File { mut reader, .. } => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl fmt::Debug for FormSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormSource::Field(bytes) => f.debug_tuple("Field").field(&bytes.len()).finish(),
            FormSource::Reader(_) => f.write_str("Reader"),
            FormSource::File { file_name, .. } => {
                f.debug_struct("File").field("file_name", file_name).finish()
            }
        }
    }
}

impl From<&str> for FormSource {
    fn from(value: &str) -> Self {
        FormSource::text(value)
    }
}

impl From<String> for FormSource {
    fn from(value: String) -> Self {
        FormSource::text(value)
    }
}

impl From<Vec<u8>> for FormSource {
    fn from(value: Vec<u8>) -> Self {
        FormSource::bytes(value)
    }
}

/// Writes `multipart/form-data` parts into memory
///
/// [`MultipartWriter::finish`] consumes the writer, so the terminating
/// boundary is written exactly once.
#[derive(Debug)]
pub struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    parts: usize,
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartWriter {
    /// Writer with a random boundary
    pub fn new() -> Self {
        Self::with_boundary(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Writer with a fixed boundary
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into(), buf: Vec::new(), parts: 0 }
    }

    /// The part delimiter
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value including the boundary
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", MULTIPART_FORM_DATA, self.boundary)
    }

    /// Append an ordinary field
    pub fn write_field(&mut self, name: &str, data: &[u8]) {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.write_part(&disposition, None, data);
    }

    /// Append a file part
    pub fn write_file(&mut self, name: &str, file_name: &str, data: &[u8]) {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(name),
            escape_quotes(file_name)
        );
        self.write_part(&disposition, Some(FILE_CONTENT_TYPE), data);
    }

    fn write_part(&mut self, disposition: &str, content_type: Option<&str>, data: &[u8]) {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        if let Some(content_type) = content_type {
            self.buf.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(data);
        self.parts += 1;
    }

    /// Write the terminating boundary and return the body
    pub fn finish(mut self) -> Bytes {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Bytes::from(self.buf)
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Encode fields as a multipart body
///
/// Every source is consumed even after a read failure; the first failure is
/// returned once the writer has been finished. Returns the content type and
/// the body.
pub async fn encode_multipart<I, K>(fields: I, writer: MultipartWriter) -> Result<(String, Bytes)>
where
    I: IntoIterator<Item = (K, FormSource)>,
    K: AsRef<str>,
{
    let mut writer = writer;
    let mut first_error: Option<Error> = None;

    for (name, source) in fields {
        let name = name.as_ref();
        if first_error.is_some() {
            drop(source);
            continue;
        }

        let file_name = source.file_name().map(str::to_string);
        match source.read_all().await {
            Ok(data) => match file_name {
                Some(file_name) => writer.write_file(name, &file_name, &data),
                None => writer.write_field(name, &data),
            },
            Err(e) => {
                first_error = Some(Error::network_with_source(
                    NetworkErrorKind::Io,
                    format!("failed to read form field {:?}", name),
                    e,
                ));
            }
        }
    }

    let content_type = writer.content_type();
    let body = writer.finish();

    match first_error {
        Some(err) => Err(err),
        None => Ok((content_type, body)),
    }
}

/// Encode string pairs as `application/x-www-form-urlencoded`
///
/// Keys and values are percent-encoded; pairs keep their input order.
///
/// # Examples
/// ```
/// use networking::form::encode_urlencoded;
///
/// let body = encode_urlencoded([("name", "john doe"), ("q", "a&b=c")]);
/// assert_eq!(body, "name=john%20doe&q=a%26b%3Dc");
/// ```
pub fn encode_urlencoded<I, K, V>(fields: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    fields
        .into_iter()
        .map(|(k, v)| {
            format!("{}={}", urlencoding::encode(k.as_ref()), urlencoding::encode(v.as_ref()))
        })
        .collect::<Vec<_>>()
        .join("&")
}
