use std::time::Duration;

use aws_sdk_s3::Client as S3Client;
use aws_config::SdkConfig as AwsSdkConfig;

use crate::{
    bucket::{Bucket, S3Bucket},
    folder::DEFAULT_MEDIA_EXTENSIONS,
    PlayerOrigin,
};


/// How long a presigned track URL stays valid.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(60 * 30);


/// Settings shared by every request, fixed at startup.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Public base URL of the player, without a trailing slash.
    pub url: String,
    /// Root folder of the season index, without surrounding slashes.
    pub index: String,
    /// Base URL of the image assets, without a trailing slash.
    pub images: String,
    pub password: String,
    pub media_extensions: Vec<String>,
    pub presign_expiry: Duration,
}

#[cfg(test)]
impl PlayerConfig {
    pub(crate) fn for_tests(index: &str) -> Self {
        Self {
            url: "https://example.test/player".into(),
            index: index.into(),
            images: "https://example.test/images".into(),
            password: "hunter2".into(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            presign_expiry: DEFAULT_PRESIGN_EXPIRY,
        }
    }
}


pub struct PlayerOriginBuilder {
    bucket: Option<String>,
    url: Option<String>,
    index: Option<String>,
    images: Option<String>,
    password: Option<String>,
    s3_client: Option<S3Client>,
    aws_sdk_config: Option<AwsSdkConfig>,
    media_extensions: Vec<String>,
    presign_expiry: Duration,
}


impl PlayerOriginBuilder {
    pub fn new() -> Self {
        Self {
            bucket: None,
            url: None,
            index: None,
            images: None,
            password: None,
            s3_client: None,
            aws_sdk_config: None,
            media_extensions: DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            presign_expiry: DEFAULT_PRESIGN_EXPIRY,
        }
    }

    /// Start from the `PLAYER_*` environment variables.
    ///
    /// Reads `PLAYER_BUCKET`, `PLAYER_URL`, `PLAYER_INDEX`, `PLAYER_IMAGES`
    /// and `PLAYER_PASSWORD`. Unset variables are left for [`build`](Self::build)
    /// to report.
    ///
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut builder = Self::new();
        if let Some(bucket) = lookup("PLAYER_BUCKET") {
            builder = builder.bucket(bucket);
        }
        if let Some(url) = lookup("PLAYER_URL") {
            builder = builder.url(url);
        }
        if let Some(index) = lookup("PLAYER_INDEX") {
            builder = builder.index(index);
        }
        if let Some(images) = lookup("PLAYER_IMAGES") {
            builder = builder.images(images);
        }
        if let Some(password) = lookup("PLAYER_PASSWORD") {
            builder = builder.password(password);
        }
        builder
    }

    /// Set the bucket name.
    ///
    /// This is required.
    ///
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Set the public URL the player is served under, e.g. `https://example.com/player`.
    ///
    /// This is required. A trailing slash is removed.
    ///
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the folder holding the seasons, e.g. `index`.
    ///
    /// This is required. Surrounding slashes are removed.
    ///
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into().trim_matches('/').to_string());
        self
    }

    /// Set the base URL of the logo and other images.
    ///
    /// This is required. A trailing slash is removed.
    ///
    pub fn images(mut self, images: impl Into<String>) -> Self {
        self.images = Some(images.into().trim_end_matches('/').to_string());
        self
    }

    /// Set the password that signs a browser in.
    ///
    /// This is required.
    ///
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the S3 client.
    ///
    /// This is optional, and defaults to a new client created from the AWS SDK config.
    ///
    pub fn client(mut self, client: S3Client) -> Self {
        self.s3_client = Some(client);
        self
    }

    /// Set the AWS SDK config.
    ///
    /// This is optional, and defaults to a new client created from the AWS SDK config.
    /// If `client` is not provided, the AWS SDK config **must** be provided.
    ///
    pub fn config(mut self, config: AwsSdkConfig) -> Self {
        self.aws_sdk_config = Some(config);
        self
    }

    /// Replace the extensions listed as playable, e.g. `[".mp3", ".flac"]`.
    ///
    /// This is optional, and defaults to `.mp3` and `.m4a`.
    ///
    pub fn media_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.media_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set how long presigned track URLs stay valid.
    ///
    /// This is optional, and defaults to 30 minutes.
    ///
    pub fn presign_expiry(mut self, expiry: Duration) -> Self {
        self.presign_expiry = expiry;
        self
    }

    /// Read the password from an AWS Systems Manager parameter.
    ///
    /// The parameter is decrypted, so a `SecureString` works.
    ///
    #[cfg(feature = "aws-parameterstore")]
    pub async fn password_from_parameter_store(self, config: &AwsSdkConfig, name: &str) -> Result<Self, &'static str> {
        let client = aws_sdk_ssm::Client::new(config);
        let output = client.get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|_| "failed to read the password parameter")?;

        let password = output.parameter()
            .and_then(|parameter| parameter.value())
            .ok_or("the password parameter has no value")?;

        Ok(self.password(password))
    }

    fn build_config(&mut self) -> Result<PlayerConfig, &'static str> {
        fn required(value: Option<String>, error: &'static str) -> Result<String, &'static str> {
            value.filter(|v| !v.is_empty()).ok_or(error)
        }

        Ok(PlayerConfig {
            url: required(self.url.take(), "url is required")?,
            index: required(self.index.take(), "index is required")?,
            images: required(self.images.take(), "images is required")?,
            password: required(self.password.take(), "password is required")?,
            media_extensions: std::mem::take(&mut self.media_extensions),
            presign_expiry: self.presign_expiry,
        })
    }

    /// Build the player origin on S3.
    ///
    /// This will return an error a required parameter is not provided.
    ///
    pub fn build(mut self) -> Result<PlayerOrigin<S3Bucket>, &'static str> {
        let bucket = self.bucket.take().filter(|b| !b.is_empty()).ok_or("bucket is required")?;
        let config = self.build_config()?;

        let s3_client = if let Some(client) = self.s3_client {
            client
        } else if let Some(aws_config) = self.aws_sdk_config {
            S3Client::new(&aws_config)
        } else {
            return Err("either s3_client or aws_sdk_config must be provided");
        };

        Ok(PlayerOrigin::new(config, S3Bucket::new(bucket, s3_client)))
    }

    /// Build the player origin on any other [`Bucket`].
    ///
    /// The bucket name, client and AWS SDK config are ignored.
    ///
    pub fn build_with<B: Bucket>(mut self, bucket: B) -> Result<PlayerOrigin<B>, &'static str> {
        let config = self.build_config()?;
        Ok(PlayerOrigin::new(config, bucket))
    }
}
impl Default for PlayerOriginBuilder {
    fn default() -> Self {
        Self::new()
    }
}
