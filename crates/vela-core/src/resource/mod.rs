// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Value-keyed descriptions of loadable resources.
//!
//! Load APIs take a [`ResourceDescriptor`] instead of having overloads for
//! plain files, packaged assets, and resources embedded in the binary. A
//! descriptor pairs a [`ResourceKey`], which decides equality, with the open
//! input stream the background decoder will consume.

use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// An owned, sendable input stream.
pub type ResourceStream = Box<dyn Read + Send>;

/// The logical identity of a resource.
///
/// Two descriptors with equal keys describe the same resource, even when they
/// are different instances with different streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// Any file the process can read, by path.
    File(PathBuf),
    /// A resource compiled into the binary, by numeric id. Id `0` is never used.
    Embedded(u32),
    /// A file relative to the application's asset directory.
    Asset(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::File(path) => write!(f, "file:{}", path.display()),
            ResourceKey::Embedded(id) => write!(f, "embedded:{id:#x}"),
            ResourceKey::Asset(name) => write!(f, "asset:{name}"),
        }
    }
}

/// Debug state of a descriptor's stream, shown by `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Opened, not yet handed out.
    Open,
    /// Claimed by a reader.
    Reading,
    /// Closed, either after reading or because nobody will read it.
    Closed,
}

struct StreamSlot {
    stream: Option<ResourceStream>,
    state: StreamState,
}

/// Describes one request for a loadable resource and owns its input stream.
///
/// Equality and hashing consider only the [`ResourceKey`]. Load APIs take
/// descriptors as `Arc<ResourceDescriptor>` and treat `Arc` pointer identity as
/// instance identity: each load call must use a fresh descriptor, even when it
/// targets a resource that is already loading.
pub struct ResourceDescriptor {
    key: ResourceKey,
    file_name_hint: Option<String>,
    slot: Mutex<StreamSlot>,
}

impl ResourceDescriptor {
    /// Opens any file the process has permission to read.
    ///
    /// # Errors
    /// Fails if the file does not exist or cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::from_reader(
            ResourceKey::File(path.to_path_buf()),
            BufReader::new(file),
        ))
    }

    /// Opens a file relative to an asset directory. `"foo/bar.png"` opens
    /// `<assets_root>/foo/bar.png`.
    ///
    /// # Errors
    /// Fails if the file does not exist or cannot be opened.
    pub fn open_asset(assets_root: impl AsRef<Path>, relative: &str) -> io::Result<Self> {
        let file = File::open(assets_root.as_ref().join(relative))?;
        Ok(Self::from_reader(
            ResourceKey::Asset(relative.to_string()),
            BufReader::new(file),
        ))
    }

    /// Wraps bytes compiled into the binary under a numeric resource id.
    pub fn embedded(id: u32, bytes: &'static [u8]) -> Self {
        debug_assert_ne!(id, 0, "embedded resource id 0 is reserved");
        Self::from_reader(ResourceKey::Embedded(id), Cursor::new(bytes))
    }

    /// Builds a descriptor from an arbitrary key and an already open stream.
    pub fn from_reader(key: ResourceKey, reader: impl Read + Send + 'static) -> Self {
        Self {
            key,
            file_name_hint: None,
            slot: Mutex::new(StreamSlot {
                stream: Some(Box::new(reader)),
                state: StreamState::Open,
            }),
        }
    }

    /// Attaches the original file name of an embedded resource, used by
    /// decoders that sniff the format from the extension.
    pub fn with_file_name_hint(mut self, name: impl Into<String>) -> Self {
        self.file_name_hint = Some(name.into());
        self
    }

    /// The value key of this descriptor.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current stream state.
    pub fn state(&self) -> StreamState {
        self.lock_slot().state
    }

    /// Claims the open stream. Only the first caller gets it; ownership moves
    /// to that caller.
    pub fn take_stream(&self) -> Option<ResourceStream> {
        let mut slot = self.lock_slot();
        let stream = slot.stream.take();
        if stream.is_some() {
            slot.state = StreamState::Reading;
        }
        stream
    }

    /// Claims the stream and reads it to the end, then marks it closed.
    ///
    /// # Errors
    /// Fails with [`io::ErrorKind::NotFound`] if the stream was already
    /// claimed or closed, or with the underlying read error.
    pub fn read_to_end(&self) -> io::Result<Vec<u8>> {
        let mut stream = self.take_stream().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("stream for {} was already claimed", self.key),
            )
        })?;
        let mut bytes = Vec::new();
        let result = stream.read_to_end(&mut bytes);
        drop(stream);
        self.lock_slot().state = StreamState::Closed;
        result.map(|_| bytes)
    }

    /// Closes the stream without reading it. Safe to call more than once.
    pub fn close_stream(&self) {
        let mut slot = self.lock_slot();
        slot.stream = None;
        slot.state = StreamState::Closed;
    }

    /// The file name of the resource, with extension, if it has one.
    pub fn file_name(&self) -> Option<&str> {
        match &self.key {
            ResourceKey::File(path) => path.file_name().and_then(|name| name.to_str()),
            ResourceKey::Asset(name) => name.rsplit(['/', '\\']).next(),
            ResourceKey::Embedded(_) => self
                .file_name_hint
                .as_deref()
                .and_then(|hint| hint.rsplit(['/', '\\']).next()),
        }
    }

    /// The lower-cased extension of [`file_name`](Self::file_name).
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    fn lock_slot(&self) -> MutexGuard<'_, StreamSlot> {
        // A reader that panicked mid-read leaves the slot in a usable state.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PartialEq for ResourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ResourceDescriptor {}

impl Hash for ResourceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{{{}}}", self.state(), self.key)
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}
