use serde::Deserialize;

use crate::model::{EntityTag, GalleryConnection, MediaRecord};

#[derive(Deserialize, Debug)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize, Debug)]
pub struct GraphqlErrorMessage {
    pub message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserMediaData {
    pub get_user_media_pagination: UserMediaPagination,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserMediaPagination {
    pub media_connection: GalleryConnection,
}

#[derive(Deserialize, Debug)]
pub struct MediaByIdData {
    pub media: Option<MediaRecord>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddEntityTagData {
    pub add_entity_tag: EntityTag,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RemoveEntityTagData {
    pub remove_entity_tag: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddMediaObjectsData {
    pub add_media_objects: Vec<MediaRecord>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMediaObjectData {
    pub delete_media_object: bool,
}
