use serde::{Deserialize, Serialize};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

pub const RETRIEVAL_EXTENSIONS: &[&str] = &[
    "c", "cs", "cpp", "doc", "docx", "html", "java", "json", "md", "pdf", "php", "pptx", "py", "rb",
    "tex", "txt", "css", "js", "sh", "ts",
];

/// Lowercased extension after the last dot, or empty when the name has none.
pub fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    Vision,
    Assistants,
}

impl FilePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Assistants => "assistants",
        }
    }
}

/// Capability a non-image attachment is exposed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCapability {
    FileSearch,
    CodeInterpreter,
}

impl AttachmentCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileSearch => "file_search",
            Self::CodeInterpreter => "code_interpreter",
        }
    }
}

/// A file already uploaded to the assistant provider, with capability flags derived once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "FileRefWire")]
pub struct FileRef {
    pub file_id: String,
    pub filename: String,
    pub extension: String,
    pub is_image: bool,
    pub is_retrievable: bool,
}

/// Incoming descriptor; flags left out are derived from the filename.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRefWire {
    #[serde(alias = "id", alias = "file_id")]
    file_id: String,
    filename: String,
    #[serde(default, alias = "vision", alias = "is_image")]
    is_image: Option<bool>,
    #[serde(default, alias = "retrieval", alias = "is_retrievable")]
    is_retrievable: Option<bool>,
}

impl From<FileRefWire> for FileRef {
    fn from(wire: FileRefWire) -> Self {
        let mut file = Self::from_upload(wire.file_id, wire.filename);
        if let Some(is_image) = wire.is_image {
            file.is_image = is_image;
        }
        if let Some(is_retrievable) = wire.is_retrievable {
            file.is_retrievable = is_retrievable;
        }
        file
    }
}

impl FileRef {
    pub fn from_upload(file_id: impl Into<String>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let extension = extension_of(&filename);
        let is_image = IMAGE_EXTENSIONS.contains(&extension.as_str());
        let is_retrievable = RETRIEVAL_EXTENSIONS.contains(&extension.as_str());
        Self { file_id: file_id.into(), filename, extension, is_image, is_retrievable }
    }

    /// Reference to a file whose name is unknown; attached with the generic capability.
    pub fn opaque(file_id: impl Into<String>) -> Self {
        let file_id = file_id.into();
        Self {
            filename: file_id.clone(),
            file_id,
            extension: String::new(),
            is_image: false,
            is_retrievable: false,
        }
    }

    pub fn purpose(&self) -> FilePurpose {
        purpose_for(&self.filename)
    }

    pub fn capability(&self) -> AttachmentCapability {
        if self.is_retrievable {
            AttachmentCapability::FileSearch
        } else {
            AttachmentCapability::CodeInterpreter
        }
    }
}

pub fn purpose_for(filename: &str) -> FilePurpose {
    if IMAGE_EXTENSIONS.contains(&extension_of(filename).as_str()) {
        FilePurpose::Vision
    } else {
        FilePurpose::Assistants
    }
}

/// File reference as it arrives at the HTTP boundary: a bare id or a full descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileInput {
    ById(String),
    Descriptor(FileRef),
}

#[cfg(test)]
mod tests {
    use super::{extension_of, AttachmentCapability, FileInput, FilePurpose, FileRef};

    #[test]
    fn image_extensions_are_image_capable() {
        let file = FileRef::from_upload("file_1", "Photo.JPG");
        assert!(file.is_image);
        assert!(!file.is_retrievable);
        assert_eq!(file.purpose(), FilePurpose::Vision);
    }

    #[test]
    fn documents_are_retrievable() {
        let file = FileRef::from_upload("file_2", "notes.md");
        assert!(!file.is_image);
        assert_eq!(file.capability(), AttachmentCapability::FileSearch);
        assert_eq!(file.purpose(), FilePurpose::Assistants);
    }

    #[test]
    fn unknown_extension_falls_back_to_code_interpreter() {
        let file = FileRef::from_upload("file_3", "data.xlsx");
        assert!(!file.is_image);
        assert!(!file.is_retrievable);
        assert_eq!(file.capability(), AttachmentCapability::CodeInterpreter);
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn file_input_accepts_both_shapes() {
        let inputs: Vec<FileInput> = serde_json::from_str(
            r#"["file_a", {"fileId": "file_b", "filename": "b.pdf", "retrieval": true}]"#,
        )
        .expect("parse file inputs");

        assert_eq!(inputs[0], FileInput::ById("file_a".to_string()));
        match &inputs[1] {
            FileInput::Descriptor(file) => {
                assert_eq!(file.file_id, "file_b");
                assert!(file.is_retrievable);
                assert!(!file.is_image);
            }
            other => panic!("expected descriptor, got {other:?}"),
        }
    }

    #[test]
    fn descriptor_without_flags_derives_them_from_extension() {
        let inputs: Vec<FileInput> = serde_json::from_str(
            r#"[{"fileId": "file_img", "filename": "photo.png"},
                {"fileId": "file_doc", "filename": "Report.PDF"},
                {"fileId": "file_txt", "filename": "notes.txt", "retrieval": false}]"#,
        )
        .expect("parse file inputs");

        let files: Vec<FileRef> = inputs
            .into_iter()
            .map(|input| match input {
                FileInput::Descriptor(file) => file,
                other => panic!("expected descriptor, got {other:?}"),
            })
            .collect();

        assert_eq!(files[0].extension, "png");
        assert!(files[0].is_image);
        assert_eq!(files[0].purpose(), FilePurpose::Vision);
        assert_eq!(files[1].extension, "pdf");
        assert!(files[1].is_retrievable);
        assert_eq!(files[1].capability(), AttachmentCapability::FileSearch);
        assert!(!files[2].is_retrievable);
        assert_eq!(files[2].capability(), AttachmentCapability::CodeInterpreter);
    }
}
