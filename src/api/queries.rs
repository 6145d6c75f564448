//! GraphQL documents sent to the media API.

const MEDIA_FIELDS: &str = r#"
fragment MediaWithTagsFields on MediaWithTags {
  id
  mediaUrl
  width
  height
  format
  size
  uploadTime
  userUuid
  entityTags {
    id
    targetId
    type
    climbName
    areaName
    ancestors
  }
}
"#;

const USER_MEDIA_BODY: &str = r#"
query UserMedia($userUuid: ID!, $first: Int, $after: ID) {
  getUserMediaPagination(input: { userUuid: $userUuid, first: $first, after: $after }) {
    mediaConnection {
      edges {
        node { ...MediaWithTagsFields }
        cursor
      }
      pageInfo {
        hasNextPage
        totalItems
      }
    }
  }
}
"#;

const MEDIA_BY_ID_BODY: &str = r#"
query MediaById($id: ID!) {
  media(input: { id: $id }) { ...MediaWithTagsFields }
}
"#;

const ADD_MEDIA_OBJECTS_BODY: &str = r#"
mutation AddMediaObjects($mediaList: [NewMediaObjectInput]) {
  addMediaObjects(input: $mediaList) { ...MediaWithTagsFields }
}
"#;

pub const ADD_ENTITY_TAG: &str = r#"
mutation AddEntityTag($mediaId: ID!, $entityId: ID!, $entityType: TagTargetType!) {
  addEntityTag(input: { mediaId: $mediaId, entityId: $entityId, entityType: $entityType }) {
    id
    targetId
    type
    climbName
    areaName
    ancestors
  }
}
"#;

pub const REMOVE_ENTITY_TAG: &str = r#"
mutation RemoveEntityTag($mediaId: ID!, $tagId: ID!) {
  removeEntityTag(input: { mediaId: $mediaId, tagId: $tagId })
}
"#;

pub const DELETE_ONE_MEDIA_OBJECT: &str = r#"
mutation DeleteOneMediaObject($mediaId: ID!) {
  deleteMediaObject(input: { mediaId: $mediaId })
}
"#;

fn with_media_fields(body: &str) -> String {
    format!("{}{}", body.trim(), MEDIA_FIELDS)
}

pub fn user_media() -> String {
    with_media_fields(USER_MEDIA_BODY)
}

pub fn media_by_id() -> String {
    with_media_fields(MEDIA_BY_ID_BODY)
}

pub fn add_media_objects() -> String {
    with_media_fields(ADD_MEDIA_OBJECTS_BODY)
}
