//! # Pager
//!
//! Maps page numbers to in-memory 4096-byte buffers backed by a single
//! database file. The file is a flat array of pages; a page's byte offset
//! is `page_num * PAGE_SIZE`.
//!
//! The pager keeps a fixed slot table of `TABLE_MAX_PAGES` entries. A page
//! is materialized on first access: slots start empty, a miss allocates a
//! zeroed buffer and, when the page exists in the file, fills it with a
//! whole-page read. All mutations happen in memory; dirty pages reach disk
//! when [`Pager::close`] flushes every populated slot.
//!
//! Page numbers are allocated append-only via [`Pager::unused_page_num`].
//! Freed pages are never reclaimed, so the next unused number is always the
//! current page count. Allocation past `TABLE_MAX_PAGES` is reported as
//! [`ExecError::TableFull`] so the caller can refuse the statement instead
//! of dying mid-mutation.
//!
//! The pager does not interpret page contents, and it guarantees at most
//! one in-memory buffer per page number.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use crate::config::{PAGE_SIZE, TABLE_MAX_PAGES};
use crate::error::ExecError;

/// Zero-based index of a page within the database file.
pub type PageNum = u32;

#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Pages present in the file when it was opened. Reads past this point
    /// see zeroes instead of touching disk.
    file_pages: u32,
    /// Total pages the database currently spans, in memory or on disk.
    num_pages: u32,
    slots: Vec<Option<Box<[u8; PAGE_SIZE]>>>,
}

impl Pager {
    /// Open the database file, creating it if absent. A file whose length
    /// is not a whole multiple of the page size is corrupt.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let file_length = file
            .metadata()
            .wrap_err("failed to stat database file")?
            .len();
        ensure!(
            file_length % PAGE_SIZE as u64 == 0,
            "database file is not a whole number of pages; corrupt file"
        );
        let file_pages = (file_length / PAGE_SIZE as u64) as u32;

        let mut slots = Vec::with_capacity(TABLE_MAX_PAGES);
        slots.resize_with(TABLE_MAX_PAGES, || None);

        Ok(Self {
            file,
            file_pages,
            num_pages: file_pages,
            slots,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// The next page number an allocation would use. Fails with
    /// `table full` once the database has reached `TABLE_MAX_PAGES`.
    pub fn unused_page_num(&self) -> Result<PageNum> {
        if self.num_pages as usize >= TABLE_MAX_PAGES {
            return Err(ExecError::TableFull.into());
        }
        Ok(self.num_pages)
    }

    /// Borrow a page for reading, materializing it on first access.
    pub fn page(&mut self, page_num: PageNum) -> Result<&[u8; PAGE_SIZE]> {
        self.ensure_loaded(page_num)?;
        self.slots[page_num as usize]
            .as_deref()
            .ok_or_else(|| eyre::eyre!("page slot {} empty after load", page_num))
    }

    /// Borrow a page for writing, materializing it on first access.
    pub fn page_mut(&mut self, page_num: PageNum) -> Result<&mut [u8; PAGE_SIZE]> {
        self.ensure_loaded(page_num)?;
        self.slots[page_num as usize]
            .as_deref_mut()
            .ok_or_else(|| eyre::eyre!("page slot {} empty after load", page_num))
    }

    fn ensure_loaded(&mut self, page_num: PageNum) -> Result<()> {
        ensure!(
            (page_num as usize) < TABLE_MAX_PAGES,
            "tried to fetch page number out of bounds: {} >= {}",
            page_num,
            TABLE_MAX_PAGES
        );

        if self.slots[page_num as usize].is_none() {
            let mut buf = Box::new([0u8; PAGE_SIZE]);
            if page_num < self.file_pages {
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
                    .wrap_err_with(|| format!("failed to seek to page {}", page_num))?;
                self.file
                    .read_exact(&mut buf[..])
                    .wrap_err_with(|| format!("failed to read page {}", page_num))?;
            }
            self.slots[page_num as usize] = Some(buf);
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }
        Ok(())
    }

    /// Write one page back to the file. Flushing a page that was never
    /// materialized is an invariant break.
    pub fn flush(&mut self, page_num: PageNum) -> Result<()> {
        ensure!(
            (page_num as usize) < TABLE_MAX_PAGES,
            "tried to flush page number out of bounds: {} >= {}",
            page_num,
            TABLE_MAX_PAGES
        );
        let buf = self.slots[page_num as usize]
            .as_deref()
            .ok_or_else(|| eyre::eyre!("tried to flush empty page slot {}", page_num))?;

        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
            .wrap_err_with(|| format!("failed to seek to page {}", page_num))?;
        self.file
            .write_all(&buf[..])
            .wrap_err_with(|| format!("failed to write page {}", page_num))?;
        Ok(())
    }

    /// Flush every populated slot. Called once on clean shutdown.
    pub fn close(&mut self) -> Result<()> {
        for page_num in 0..self.num_pages {
            if self.slots[page_num as usize].is_some() {
                self.flush(page_num)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_database() {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("test.db")).unwrap();
        assert_eq!(pager.num_pages(), 0);
        assert_eq!(pager.unused_page_num().unwrap(), 0);
    }

    #[test]
    fn open_rejects_partial_page_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        fs::write(&path, vec![0u8; PAGE_SIZE + 100]).unwrap();

        let result = Pager::open(&path);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("whole number of pages"));
    }

    #[test]
    fn fresh_page_is_zeroed_and_counted() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        let page = pager.page(0).unwrap();
        assert!(page.iter().all(|&b| b == 0));
        assert_eq!(pager.num_pages(), 1);
        assert_eq!(pager.unused_page_num().unwrap(), 1);
    }

    #[test]
    fn writes_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            let page = pager.page_mut(0).unwrap();
            page[0] = 0xCA;
            page[PAGE_SIZE - 1] = 0xFE;
            pager.close().unwrap();
        }

        {
            let mut pager = Pager::open(&path).unwrap();
            assert_eq!(pager.num_pages(), 1);
            let page = pager.page(0).unwrap();
            assert_eq!(page[0], 0xCA);
            assert_eq!(page[PAGE_SIZE - 1], 0xFE);
        }
    }

    #[test]
    fn page_fetch_out_of_bounds_fails() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        let result = pager.page(TABLE_MAX_PAGES as u32);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of bounds"));
    }

    #[test]
    fn flush_of_empty_slot_fails() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        let result = pager.flush(0);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty page slot"));
    }

    #[test]
    fn allocation_stops_at_table_max_pages() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.db")).unwrap();

        pager.page(TABLE_MAX_PAGES as u32 - 1).unwrap();
        assert_eq!(pager.num_pages(), TABLE_MAX_PAGES as u32);

        let err = pager.unused_page_num().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ExecError>(),
            Some(&ExecError::TableFull)
        );
    }

    #[test]
    fn close_flushes_only_populated_slots() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            pager.page_mut(0).unwrap()[0] = 1;
            pager.page_mut(2).unwrap()[0] = 3;
            pager.close().unwrap();
        }

        // Page 1 was never touched; the file still covers it with zeroes
        // because page 2 was written at its own offset.
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 3 * PAGE_SIZE);
        assert_eq!(bytes[0], 1);
        assert!(bytes[PAGE_SIZE..2 * PAGE_SIZE].iter().all(|&b| b == 0));
        assert_eq!(bytes[2 * PAGE_SIZE], 3);
    }
}
