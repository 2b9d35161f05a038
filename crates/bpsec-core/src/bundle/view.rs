//! The editable bundle view.

use tracing::debug;

use crate::block::{AbstractSecurityBlock, CONFIDENTIALITY_BLOCK_TYPE};
use crate::cbor::decode_one;

use super::canonical::{CanonicalBlock, PAYLOAD_BLOCK_TYPE};
use super::error::BundleError;
use super::primary::PrimaryBlock;

/// CBOR framing bytes of the bundle's indefinite-length array.
const INDEFINITE_ARRAY_START: u8 = 0x9F;
const BREAK: u8 = 0xFF;

/// One canonical block plus the view's bookkeeping.
#[derive(Debug, Clone)]
struct BlockSlot {
    block: CanonicalBlock,
    is_encrypted: bool,
    removed: bool,
}

/// An editable, in-memory view of one BPv7 bundle.
///
/// Holds no references into the loaded buffer; the view owns its data and
/// can outlive (and re-render independently of) the input bytes.
#[derive(Debug, Clone)]
pub struct BundleView {
    /// The bundle's primary block.
    pub primary: PrimaryBlock,
    slots: Vec<BlockSlot>,
}

impl BundleView {
    /// Creates a view with the given primary block and no canonical blocks.
    #[must_use]
    pub fn new(primary: PrimaryBlock) -> Self {
        Self {
            primary,
            slots: Vec::new(),
        }
    }

    /// Parses a serialized bundle.
    ///
    /// Targets of every decodable BCB are marked `is_encrypted` so that
    /// callers see the flag before any security processing runs.
    ///
    /// # Errors
    ///
    /// Returns a [`BundleError`] for framing, shape, version, CRC, or
    /// block-numbering violations.
    pub fn load(buffer: &[u8]) -> Result<Self, BundleError> {
        let (&first, mut rest) = buffer.split_first().ok_or(BundleError::Truncated)?;
        if first != INDEFINITE_ARRAY_START {
            return Err(BundleError::BadFraming);
        }

        // Primary block.
        let before = rest;
        let primary_value = decode_one(&mut rest).ok_or(BundleError::Truncated)?;
        let primary_raw = &before[..before.len() - rest.len()];
        let primary = PrimaryBlock::decode(&primary_value, primary_raw)?;

        // Canonical blocks up to the break byte.
        let mut slots: Vec<BlockSlot> = Vec::new();
        loop {
            match rest.first() {
                None => return Err(BundleError::Truncated),
                Some(&BREAK) => {
                    rest = &rest[1..];
                    break;
                }
                Some(_) => {}
            }
            let before = rest;
            let value = decode_one(&mut rest).ok_or(BundleError::Truncated)?;
            let raw = &before[..before.len() - rest.len()];
            let block = CanonicalBlock::decode(&value, raw)?;

            if slots.iter().any(|s| s.block.block_number == block.block_number) {
                return Err(BundleError::DuplicateBlockNumber {
                    number: block.block_number,
                });
            }
            if block.block_type == PAYLOAD_BLOCK_TYPE && block.block_number != 1 {
                return Err(BundleError::BadPayloadNumber {
                    found: block.block_number,
                });
            }
            slots.push(BlockSlot {
                block,
                is_encrypted: false,
                removed: false,
            });
        }

        let mut view = Self { primary, slots };
        view.mark_bcb_targets_encrypted();
        debug!(
            blocks = view.slots.len(),
            source = %view.primary.source,
            destination = %view.primary.destination,
            "bundle loaded"
        );
        Ok(view)
    }

    /// Renders the bundle back to contiguous bytes, skipping removed
    /// blocks.
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(INDEFINITE_ARRAY_START);
        out.extend_from_slice(&self.primary.encode());
        for slot in self.slots.iter().filter(|s| !s.removed) {
            out.extend_from_slice(&slot.block.encode());
        }
        out.push(BREAK);
        out
    }

    /// The block number the next [`Self::insert_block`] call will assign.
    /// The outgoing processor folds the future security block's header into
    /// the AAD before the block exists.
    #[must_use]
    pub fn next_block_number(&self) -> u64 {
        self.slots
            .iter()
            .map(|s| s.block.block_number)
            .max()
            .map_or(1, |n| n + 1)
    }

    /// Appends a block, assigning the next free block number. Returns the
    /// assigned number.
    pub fn insert_block(&mut self, mut block: CanonicalBlock) -> u64 {
        let next = self.next_block_number();
        block.block_number = next;
        self.slots.push(BlockSlot {
            block,
            is_encrypted: false,
            removed: false,
        });
        next
    }

    /// Appends a block keeping its declared number (test construction
    /// helper; numbers must stay unique).
    pub fn push_block(&mut self, block: CanonicalBlock) {
        self.slots.push(BlockSlot {
            block,
            is_encrypted: false,
            removed: false,
        });
    }

    /// Block numbers of all live blocks with the given type.
    #[must_use]
    pub fn block_numbers_by_type(&self, block_type: u8) -> Vec<u64> {
        self.slots
            .iter()
            .filter(|s| !s.removed && s.block.block_type == block_type)
            .map(|s| s.block.block_number)
            .collect()
    }

    /// A live block by number.
    #[must_use]
    pub fn block_by_number(&self, number: u64) -> Option<&CanonicalBlock> {
        self.slot(number).map(|s| &s.block)
    }

    /// Mutable access to a live block by number.
    pub fn block_mut_by_number(&mut self, number: u64) -> Option<&mut CanonicalBlock> {
        self.slot_mut(number).map(|s| &mut s.block)
    }

    /// Marks a block removed; it no longer renders or enumerates.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::NoSuchBlock`] when no live block has this
    /// number.
    pub fn remove_block(&mut self, number: u64) -> Result<(), BundleError> {
        let slot = self
            .slot_mut(number)
            .ok_or(BundleError::NoSuchBlock { number })?;
        slot.removed = true;
        Ok(())
    }

    /// The `is_encrypted` flag of a live block.
    #[must_use]
    pub fn is_encrypted(&self, number: u64) -> bool {
        self.slot(number).is_some_and(|s| s.is_encrypted)
    }

    /// Sets the `is_encrypted` flag of a live block.
    pub fn set_encrypted(&mut self, number: u64, encrypted: bool) {
        if let Some(slot) = self.slot_mut(number) {
            slot.is_encrypted = encrypted;
        }
    }

    /// Iterates the live canonical blocks in bundle order.
    pub fn blocks(&self) -> impl Iterator<Item = &CanonicalBlock> {
        self.slots
            .iter()
            .filter(|s| !s.removed)
            .map(|s| &s.block)
    }

    fn slot(&self, number: u64) -> Option<&BlockSlot> {
        self.slots
            .iter()
            .find(|s| !s.removed && s.block.block_number == number)
    }

    fn slot_mut(&mut self, number: u64) -> Option<&mut BlockSlot> {
        self.slots
            .iter_mut()
            .find(|s| !s.removed && s.block.block_number == number)
    }

    fn mark_bcb_targets_encrypted(&mut self) {
        let mut encrypted_targets = Vec::new();
        for slot in self
            .slots
            .iter()
            .filter(|s| s.block.block_type == CONFIDENTIALITY_BLOCK_TYPE)
        {
            if let Ok(asb) = AbstractSecurityBlock::decode(&slot.block.data) {
                encrypted_targets.extend(asb.targets);
            }
        }
        for number in encrypted_targets {
            self.set_encrypted(number, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use ciborium::value::Value;

    use crate::block::{RESULT_AUTH, PARAM_IV};
    use crate::context::BCB_AES_GCM_ID;
    use crate::eid::Eid;

    use super::*;

    fn sample_view() -> BundleView {
        let mut primary = PrimaryBlock::new(Eid::new(1, 1), Eid::new(2, 1));
        primary.lifetime_ms = 1000;
        let mut view = BundleView::new(primary);
        view.push_block(CanonicalBlock::new(4, 2, 0x10, b"extension".to_vec()));
        view.push_block(CanonicalBlock::new(
            PAYLOAD_BLOCK_TYPE,
            1,
            0x10,
            b"the payload".to_vec(),
        ));
        view
    }

    #[test]
    fn render_load_round_trips() {
        let view = sample_view();
        let bytes = view.render();
        let loaded = BundleView::load(&bytes).unwrap();
        assert_eq!(loaded.primary, view.primary);
        assert_eq!(loaded.render(), bytes);
        assert_eq!(loaded.block_numbers_by_type(PAYLOAD_BLOCK_TYPE), vec![1]);
    }

    #[test]
    fn framing_violations_are_rejected() {
        assert!(matches!(
            BundleView::load(&[]),
            Err(BundleError::Truncated)
        ));

        let mut bytes = sample_view().render();
        bytes[0] = 0x84;
        assert!(matches!(
            BundleView::load(&bytes),
            Err(BundleError::BadFraming)
        ));

        let bytes = sample_view().render();
        assert!(matches!(
            BundleView::load(&bytes[..bytes.len() - 1]),
            Err(BundleError::Truncated)
        ));
    }

    #[test]
    fn duplicate_numbers_and_bad_payload_number_are_rejected() {
        let mut view = sample_view();
        view.push_block(CanonicalBlock::new(4, 2, 0, Vec::new()));
        assert!(matches!(
            BundleView::load(&view.render()),
            Err(BundleError::DuplicateBlockNumber { number: 2 })
        ));

        let mut primary_only = BundleView::new(PrimaryBlock::new(Eid::new(1, 1), Eid::new(2, 1)));
        primary_only.push_block(CanonicalBlock::new(PAYLOAD_BLOCK_TYPE, 9, 0, Vec::new()));
        assert!(matches!(
            BundleView::load(&primary_only.render()),
            Err(BundleError::BadPayloadNumber { found: 9 })
        ));
    }

    #[test]
    fn insert_assigns_next_free_number_and_grows_rendering() {
        let mut view = sample_view();
        let before = view.render().len();
        let number = view.insert_block(CanonicalBlock::new(11, 0, 0, vec![0; 40]));
        assert_eq!(number, 3);
        assert!(view.render().len() > before);
    }

    #[test]
    fn removed_blocks_do_not_render() {
        let mut view = sample_view();
        view.remove_block(2).unwrap();
        assert!(view.block_by_number(2).is_none());
        let loaded = BundleView::load(&view.render()).unwrap();
        assert!(loaded.block_by_number(2).is_none());
        assert!(view.remove_block(2).is_err());
    }

    #[test]
    fn loading_marks_bcb_targets_encrypted() {
        let mut view = sample_view();
        let mut asb = AbstractSecurityBlock::new(BCB_AES_GCM_ID, Eid::new(10, 1));
        asb.targets.push(1);
        asb.parameters.push((PARAM_IV, Value::Bytes(vec![0; 12])));
        asb.results
            .push(vec![(RESULT_AUTH, Value::Bytes(vec![0; 16]))]);
        view.insert_block(CanonicalBlock::new(
            CONFIDENTIALITY_BLOCK_TYPE,
            0,
            0,
            asb.encode(),
        ));

        let loaded = BundleView::load(&view.render()).unwrap();
        assert!(loaded.is_encrypted(1));
        assert!(!loaded.is_encrypted(2));
    }
}
