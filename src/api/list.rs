use std::sync::Arc;

use axum::{extract::State, Json};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::ObjectStorage;
use crate::utils::{format_file_size, is_directory_marker};

use super::ActionError;

/// Output shape of the list action / 列表输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    Images,
    Files,
}

/// One listed object as sent to the editor / 返回给编辑器的对象描述
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObjectDescriptor {
    /// `thumb` is the same URL, no thumbnails are generated
    Image {
        image: String,
        thumb: String,
        title: String,
    },
    File {
        title: String,
        name: String,
        link: String,
        size: String,
    },
}

/// List action / 列表动作
pub struct ListAction {
    storage: Arc<ObjectStorage>,
    mode: ListMode,
}

impl ListAction {
    pub fn new(storage: Arc<ObjectStorage>, mode: ListMode) -> Self {
        Self { storage, mode }
    }

    /// Describe every non-directory object under the configured prefix / 列出对象描述
    pub async fn describe(&self) -> Result<Vec<ObjectDescriptor>, StorageError> {
        let mut objects = self.storage.list_files(None, None)?;
        let mut descriptors = Vec::new();

        while let Some(object) = objects.try_next().await? {
            if is_directory_marker(&object.key) {
                continue;
            }
            let url = self.storage.get_object_url(None, &object.key);
            descriptors.push(match self.mode {
                ListMode::Images => ObjectDescriptor::Image {
                    image: url.clone(),
                    thumb: url,
                    title: object.key,
                },
                ListMode::Files => ObjectDescriptor::File {
                    title: object.key.clone(),
                    name: object.key,
                    link: url,
                    size: format_file_size(object.size),
                },
            });
        }

        tracing::debug!("Listed {} objects ({:?})", descriptors.len(), self.mode);
        Ok(descriptors)
    }
}

/// GET /api/images, /api/files - 列出已上传的文件
pub async fn list(State(action): State<Arc<ListAction>>) -> Result<Json<Vec<ObjectDescriptor>>, ActionError> {
    Ok(Json(action.describe().await?))
}
