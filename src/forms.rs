//! HTML form handling
//!
//! Each form holds the raw submitted values, validates them field by field
//! and, when invalid, is rendered back with its errors. Field rules are the
//! ones the services enforce; uniqueness is reported by the services at save
//! time and merged into the same error map by the handlers.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::services::{category, page, user};

/// Directory under the media root holding profile pictures
pub const PROFILE_IMAGES_DIR: &str = "profile_images";

/// Error messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }
}

/// New category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
}

impl CategoryForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if let Err(e) = category::validate_name(&self.name) {
            errors.add("name", e.to_string());
        }
        errors
    }
}

/// New page within a category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl PageForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if let Err(page::PageServiceError::ValidationError { message, .. }) =
            page::validate_title(&self.title)
        {
            errors.add("title", message);
        }
        if let Err(page::PageServiceError::ValidationError { message, .. }) =
            page::validate_url(&self.url)
        {
            errors.add("url", message);
        }
        errors
    }
}

/// Account part of the registration form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

impl UserForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        if let Err(user::UserServiceError::ValidationError { field, message }) =
            user::validate_username(&self.username)
        {
            errors.add(field, message);
        }
        if let Err(user::UserServiceError::ValidationError { field, message }) =
            user::validate_email(&self.email)
        {
            errors.add(field, message);
        }
        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        errors
    }
}

/// An uploaded image, held in memory until the form validates
#[derive(Debug, Clone)]
pub struct UploadedPicture {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Profile part of the registration form
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserProfileForm {
    pub website: String,
    #[serde(skip)]
    pub picture: Option<UploadedPicture>,
}

impl UserProfileForm {
    pub fn validate(&self, media: &MediaConfig) -> FormErrors {
        let mut errors = FormErrors::default();

        if !self.website.trim().is_empty() {
            if let Err(user::UserServiceError::ValidationError { field, message }) =
                user::validate_website(&self.website)
            {
                errors.add(field, message);
            }
        }

        if let Some(picture) = &self.picture {
            if !media.is_type_allowed(&picture.content_type) {
                errors.add(
                    "picture",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                );
            } else if picture.data.len() as u64 > media.max_file_size {
                errors.add(
                    "picture",
                    format!(
                        "File too large. Maximum size: {} MB.",
                        media.max_file_size / 1024 / 1024
                    ),
                );
            }
        }

        errors
    }
}

/// Write an uploaded picture under `<media>/profile_images/` with a random
/// name, returning its path relative to the media root.
pub async fn store_picture(media: &MediaConfig, picture: &UploadedPicture) -> Result<String> {
    let dir = media.path.join(PROFILE_IMAGES_DIR);
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create media directory {:?}", dir))?;

    let filename = format!(
        "{}.{}",
        Uuid::new_v4().simple(),
        media.get_extension(&picture.content_type)
    );
    let path = dir.join(&filename);
    fs::write(&path, &picture.data)
        .await
        .with_context(|| format!("Failed to save picture {:?}", path))?;

    Ok(format!("{}/{}", PROFILE_IMAGES_DIR, filename))
}

/// Remove a stored picture, given its path relative to the media root
pub async fn remove_picture(media_root: &Path, relative: &str) {
    if let Err(e) = fs::remove_file(media_root.join(relative)).await {
        tracing::warn!("Failed to remove picture {}: {}", relative, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn field<'a>(errors: &'a FormErrors, name: &str) -> &'a [String] {
        errors.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    #[test]
    fn test_category_form() {
        assert!(CategoryForm { name: "Python".into() }.validate().is_empty());

        let errors = CategoryForm { name: "  ".into() }.validate();
        assert_eq!(field(&errors, "name"), ["This field is required.".to_string()]);

        let errors = CategoryForm { name: "x".repeat(129) }.validate();
        assert_eq!(field(&errors, "name").len(), 1);
    }

    #[test]
    fn test_page_form() {
        let form = PageForm {
            title: "Docs".into(),
            url: "docs.python.org".into(),
        };
        assert!(form.validate().is_empty());

        let errors = PageForm::default().validate();
        assert_eq!(field(&errors, "title").len(), 1);
        assert_eq!(field(&errors, "url").len(), 1);
    }

    #[test]
    fn test_user_form() {
        let form = UserForm {
            username: "leifos".into(),
            email: String::new(),
            password: "secret".into(),
        };
        assert!(form.validate().is_empty());

        let errors = UserForm {
            username: "bad name".into(),
            email: "nope".into(),
            password: String::new(),
        }
        .validate();
        assert_eq!(field(&errors, "username").len(), 1);
        assert_eq!(field(&errors, "email").len(), 1);
        assert_eq!(field(&errors, "password").len(), 1);
    }

    #[test]
    fn test_user_form_never_serializes_password() {
        let form = UserForm {
            username: "leifos".into(),
            email: String::new(),
            password: "secret".into(),
        };
        let json = serde_json::to_string(&form).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_profile_form_picture_rules() {
        let media = MediaConfig {
            max_file_size: 10,
            ..MediaConfig::default()
        };

        let ok = UserProfileForm {
            website: "www.example.com".into(),
            picture: Some(UploadedPicture {
                content_type: "image/png".into(),
                data: vec![0; 10],
            }),
        };
        assert!(ok.validate(&media).is_empty());

        let wrong_type = UserProfileForm {
            picture: Some(UploadedPicture {
                content_type: "text/plain".into(),
                data: vec![0; 1],
            }),
            ..Default::default()
        };
        assert_eq!(field(&wrong_type.validate(&media), "picture").len(), 1);

        let too_big = UserProfileForm {
            picture: Some(UploadedPicture {
                content_type: "image/png".into(),
                data: vec![0; 11],
            }),
            ..Default::default()
        };
        assert_eq!(field(&too_big.validate(&media), "picture").len(), 1);
    }

    #[test]
    fn test_merge_and_serialize() {
        let mut errors = FormErrors::default();
        errors.add("name", "first");
        let mut more = FormErrors::default();
        more.add("name", "second");
        errors.merge(more);

        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({ "name": ["first", "second"] })
        );
    }

    #[tokio::test]
    async fn test_store_and_remove_picture() {
        let dir = TempDir::new().unwrap();
        let media = MediaConfig {
            path: dir.path().to_path_buf(),
            ..MediaConfig::default()
        };
        let picture = UploadedPicture {
            content_type: "image/png".into(),
            data: b"not really a png".to_vec(),
        };

        let relative = store_picture(&media, &picture).await.unwrap();
        assert!(relative.starts_with("profile_images/"));
        assert!(relative.ends_with(".png"));
        let stored = std::fs::read(dir.path().join(&relative)).unwrap();
        assert_eq!(stored, picture.data);

        remove_picture(dir.path(), &relative).await;
        assert!(!dir.path().join(&relative).exists());
    }
}
