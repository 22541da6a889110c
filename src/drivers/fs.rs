// Filesystem protocol boundary
//
// Request/response marshalling lives in the filesystem client, which
// pumps its completions as a Transport and parks the interpreter on
// EventSource::Fs while a request is in flight. This module fixes the
// ABI both sides agree on: signed status codes (0 = success) and the
// 64-bit stat record.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle(pub u64);

/// Nonzero status returned by the filesystem server, passed through
/// unchanged to interpreter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsError(pub i32);

impl FsError {
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fs status {}", self.0)
    }
}

/// Turn a raw protocol status into a result.
pub const fn check(status: i32) -> Result<(), FsError> {
    if status == 0 { Ok(()) } else { Err(FsError(status)) }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub dev: u64,
    pub ino: u64,
    pub mode: u64,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: u64,
    pub atime_nsec: u64,
    pub mtime: u64,
    pub mtime_nsec: u64,
    pub ctime: u64,
    pub ctime_nsec: u64,
}

impl Stat {
    const S_IFMT: u64 = 0o170000;
    const S_IFDIR: u64 = 0o040000;

    pub const fn is_dir(&self) -> bool {
        self.mode & Self::S_IFMT == Self::S_IFDIR
    }
}

/// Filesystem operations as the interpreter's VFS uses them.
///
/// Every call may suspend the interpreter context until the server's
/// completion arrives.
#[allow(async_fn_in_trait)]
pub trait FileSystem {
    async fn open(&mut self, path: &str) -> Result<Fd, FsError>;
    async fn close(&mut self, fd: Fd) -> Result<(), FsError>;
    /// Read up to `buf.len()` bytes at `offset`; 0 means end of file.
    async fn pread(&mut self, fd: Fd, buf: &mut [u8], offset: u64) -> Result<usize, FsError>;
    async fn pwrite(&mut self, fd: Fd, buf: &[u8], offset: u64) -> Result<usize, FsError>;
    async fn stat(&mut self, path: &str) -> Result<Stat, FsError>;
    async fn rename(&mut self, old: &str, new: &str) -> Result<(), FsError>;
    async fn unlink(&mut self, path: &str) -> Result<(), FsError>;
    async fn mkdir(&mut self, path: &str) -> Result<(), FsError>;
    async fn rmdir(&mut self, path: &str) -> Result<(), FsError>;
    async fn fsync(&mut self, fd: Fd) -> Result<(), FsError>;

    async fn opendir(&mut self, path: &str) -> Result<DirHandle, FsError>;
    /// Copy the next entry name into `name`; `None` at end of directory.
    async fn readdir(&mut self, dir: DirHandle, name: &mut [u8]) -> Result<Option<usize>, FsError>;
    async fn closedir(&mut self, dir: DirHandle) -> Result<(), FsError>;
    async fn seekdir(&mut self, dir: DirHandle, loc: i64);
    async fn telldir(&mut self, dir: DirHandle) -> i64;
    async fn rewinddir(&mut self, dir: DirHandle);
}

/// Load a whole file (a source unit, usually) into `buf`.
///
/// Returns the bytes read; stops early if `buf` fills up. The file is
/// closed on every path.
pub async fn read_to_end<F: FileSystem>(fs: &mut F, path: &str, buf: &mut [u8]) -> Result<usize, FsError> {
    let fd = fs.open(path).await?;
    let mut total = 0;
    let result = loop {
        if total == buf.len() {
            break Ok(total);
        }
        match fs.pread(fd, &mut buf[total..], total as u64).await {
            Ok(0) => break Ok(total),
            Ok(n) => total += n,
            Err(e) => break Err(e),
        }
    };
    let closed = fs.close(fd).await;
    let total = result?;
    closed?;
    Ok(total)
}
