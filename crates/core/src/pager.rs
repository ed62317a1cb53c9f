/// One screen of results plus whether neighbouring pages exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultPage<'a, T> {
    pub records: &'a [T],
    pub has_prev: bool,
    pub has_next: bool,
}

/// Slices `records[offset..offset + page_size]`, clamped to the available
/// length. An offset beyond the end yields an empty page with
/// `has_next = false`; `has_prev` is computed from the offset alone.
pub fn page<T>(records: &[T], offset: usize, page_size: usize) -> ResultPage<'_, T> {
    let start = offset.min(records.len());
    let end = offset.saturating_add(page_size).min(records.len());

    ResultPage {
        records: &records[start..end],
        has_prev: offset > 0,
        has_next: offset.saturating_add(page_size) < records.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::page;

    const RECORDS: [u32; 7] = [1, 2, 3, 4, 5, 6, 7];

    #[test]
    fn first_page_of_seven_records() {
        let result = page(&RECORDS, 0, 3);
        assert_eq!(result.records, &[1, 2, 3]);
        assert!(!result.has_prev);
        assert!(result.has_next);
    }

    #[test]
    fn middle_page_of_seven_records() {
        let result = page(&RECORDS, 3, 3);
        assert_eq!(result.records, &[4, 5, 6]);
        assert!(result.has_prev);
        assert!(result.has_next);
    }

    #[test]
    fn last_partial_page_of_seven_records() {
        let result = page(&RECORDS, 6, 3);
        assert_eq!(result.records, &[7]);
        assert!(result.has_prev);
        assert!(!result.has_next);
    }

    #[test]
    fn offset_beyond_length_yields_empty_page_with_prev() {
        let result = page(&RECORDS, 30, 3);
        assert!(result.records.is_empty());
        assert!(result.has_prev);
        assert!(!result.has_next);
    }

    #[test]
    fn exact_boundary_has_no_next() {
        let records = [1, 2, 3, 4, 5, 6];
        let result = page(&records, 3, 3);
        assert_eq!(result.records, &[4, 5, 6]);
        assert!(!result.has_next);
    }

    #[test]
    fn empty_input_yields_empty_page() {
        let records: [u32; 0] = [];
        let result = page(&records, 0, 3);
        assert!(result.records.is_empty());
        assert!(!result.has_prev);
        assert!(!result.has_next);
    }
}
