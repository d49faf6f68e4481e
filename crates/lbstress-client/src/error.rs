use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("invalid url '{url}': {source}")]
  InvalidUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),
}
