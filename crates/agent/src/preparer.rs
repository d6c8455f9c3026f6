use std::sync::Arc;

use switchboard_core::domain::file::{FileInput, FileRef};

use crate::client::{
    AssistantsApi, FileUpload, MessageAttachment, Metadata, NewMessage, ProviderError, Thread,
    ASSISTANT_NAME_METADATA_KEY,
};

#[derive(Clone, Debug, Default)]
pub struct PrepareRequest {
    pub thread_id: Option<String>,
    pub assistant_name: Option<String>,
    pub metadata: Metadata,
    pub content: String,
    pub attachments: Vec<FileRef>,
}

/// Resolves or creates the thread for a run and posts the user's content onto it.
#[derive(Clone)]
pub struct ThreadPreparer {
    api: Arc<dyn AssistantsApi>,
}

impl ThreadPreparer {
    pub fn new(api: Arc<dyn AssistantsApi>) -> Self {
        Self { api }
    }

    pub async fn prepare(&self, request: PrepareRequest) -> Result<Thread, ProviderError> {
        let PrepareRequest { thread_id, assistant_name, metadata, content, attachments } = request;
        let thread = self.resolve_thread(thread_id.as_deref(), assistant_name, metadata).await?;

        let (images, documents): (Vec<FileRef>, Vec<FileRef>) =
            attachments.into_iter().partition(|file| file.is_image);
        let descriptors = documents.iter().map(MessageAttachment::for_file).collect();

        self.api.create_message(&thread.id, NewMessage::user_text(content, descriptors)).await?;
        for image in &images {
            self.api.create_message(&thread.id, NewMessage::user_image(image.file_id.clone())).await?;
        }

        tracing::debug!(
            event_name = "thread.prepared",
            thread_id = %thread.id,
            attachments = documents.len(),
            images = images.len(),
            "posted user content"
        );
        Ok(thread)
    }

    /// Fetches the requested thread, falling back to a fresh one when it cannot be retrieved.
    pub async fn resolve_thread(
        &self,
        thread_id: Option<&str>,
        assistant_name: Option<String>,
        mut metadata: Metadata,
    ) -> Result<Thread, ProviderError> {
        if let Some(thread_id) = thread_id {
            match self.api.retrieve_thread(thread_id).await {
                Ok(thread) => return Ok(thread),
                Err(error) => tracing::warn!(
                    event_name = "thread.retrieve_failed",
                    thread_id,
                    error = %error,
                    "could not retrieve thread, creating a new one"
                ),
            }
        }

        if let Some(name) = assistant_name {
            metadata.insert(ASSISTANT_NAME_METADATA_KEY.to_string(), name);
        }
        let thread = self.api.create_thread(&metadata).await?;
        tracing::info!(event_name = "thread.created", thread_id = %thread.id, "created thread");
        Ok(thread)
    }

    /// Uploads raw bytes and returns a reference with capability flags derived from the filename.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<FileRef, ProviderError> {
        let object = self.api.upload_file(FileUpload::new(filename, bytes)).await?;
        tracing::info!(event_name = "file.uploaded", file_id = %object.id, filename, "uploaded file");
        Ok(FileRef::from_upload(object.id, filename))
    }

    /// Normalizes boundary file references. Bare ids are looked up for their filename and fall
    /// back to an opaque reference when the lookup fails.
    pub async fn resolve_files(&self, inputs: Vec<FileInput>) -> Vec<FileRef> {
        let mut files = Vec::with_capacity(inputs.len());
        for input in inputs {
            let file = match input {
                FileInput::Descriptor(file) => file,
                FileInput::ById(file_id) => match self.api.retrieve_file(&file_id).await {
                    Ok(object) => FileRef::from_upload(object.id, object.filename),
                    Err(error) => {
                        tracing::warn!(
                            event_name = "file.lookup_failed",
                            file_id = %file_id,
                            error = %error,
                            "attaching file without metadata"
                        );
                        FileRef::opaque(file_id)
                    }
                },
            };
            files.push(file);
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchboard_core::domain::file::{FileInput, FileRef};

    use super::{PrepareRequest, ThreadPreparer};
    use crate::client::{MessageBody, Metadata, ASSISTANT_NAME_METADATA_KEY};
    use crate::memory::InMemoryAssistants;

    #[tokio::test]
    async fn existing_thread_is_reused() {
        let api = Arc::new(InMemoryAssistants::new());
        api.insert_thread("thread_known", Metadata::new()).await;
        let preparer = ThreadPreparer::new(api.clone());

        let thread = preparer
            .prepare(PrepareRequest {
                thread_id: Some("thread_known".to_string()),
                content: "hello".to_string(),
                ..PrepareRequest::default()
            })
            .await
            .expect("prepare");

        assert_eq!(thread.id, "thread_known");
        assert_eq!(api.threads().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_retrieval_creates_new_thread_with_assistant_name() {
        let api = Arc::new(InMemoryAssistants::new());
        api.fail_thread_retrieval().await;
        let preparer = ThreadPreparer::new(api.clone());

        let mut metadata = Metadata::new();
        metadata.insert("from".to_string(), "+1555".to_string());
        let thread = preparer
            .prepare(PrepareRequest {
                thread_id: Some("thread_gone".to_string()),
                assistant_name: Some("Helper".to_string()),
                metadata,
                content: "hello".to_string(),
                attachments: Vec::new(),
            })
            .await
            .expect("prepare");

        assert_ne!(thread.id, "thread_gone");
        assert_eq!(thread.metadata.get(ASSISTANT_NAME_METADATA_KEY).map(String::as_str), Some("Helper"));
        assert_eq!(thread.metadata.get("from").map(String::as_str), Some("+1555"));
    }

    #[tokio::test]
    async fn images_are_posted_as_separate_messages() {
        let api = Arc::new(InMemoryAssistants::new());
        let preparer = ThreadPreparer::new(api.clone());

        let thread = preparer
            .prepare(PrepareRequest {
                content: "see attached".to_string(),
                attachments: vec![
                    FileRef::from_upload("file_img", "photo.png"),
                    FileRef::from_upload("file_doc", "spec.pdf"),
                    FileRef::from_upload("file_csv", "data.csv"),
                ],
                ..PrepareRequest::default()
            })
            .await
            .expect("prepare");

        let posted = api.posted_messages().await;
        assert_eq!(posted.len(), 2);
        assert!(posted.iter().all(|message| message.thread_id == thread.id));

        let text = &posted[0].message;
        assert_eq!(text.content, MessageBody::Text("see attached".to_string()));
        let capabilities: Vec<(&str, &str)> = text
            .attachments
            .iter()
            .map(|attachment| (attachment.file_id.as_str(), attachment.tools[0].kind))
            .collect();
        assert_eq!(capabilities, vec![("file_doc", "file_search"), ("file_csv", "code_interpreter")]);

        assert!(matches!(posted[1].message.content, MessageBody::Parts(ref parts) if parts.len() == 1));
    }

    #[tokio::test]
    async fn bare_file_ids_are_resolved_or_kept_opaque() {
        let api = Arc::new(InMemoryAssistants::new());
        let preparer = ThreadPreparer::new(api.clone());
        let uploaded = preparer.upload("chart.png", vec![1, 2, 3]).await.expect("upload");
        assert!(uploaded.is_image);

        let files = preparer
            .resolve_files(vec![
                FileInput::ById(uploaded.file_id.clone()),
                FileInput::ById("file_unknown".to_string()),
                FileInput::Descriptor(FileRef::from_upload("file_doc", "notes.md")),
            ])
            .await;

        assert_eq!(files[0], uploaded);
        assert_eq!(files[1], FileRef::opaque("file_unknown"));
        assert!(files[2].is_retrievable);
        assert_eq!(api.uploaded_filenames().await, vec!["chart.png".to_string()]);
    }
}
