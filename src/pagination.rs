use serde::Serialize;
use thiserror::Error;

pub const STUDENTS_PER_PAGE: usize = 34;
pub const TEMPLATE_PAGES: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Group has {students} students, exceeding maximum capacity of {capacity} students ({max_pages} sheets)")]
pub struct CapacityError {
    pub students: usize,
    pub capacity: usize,
    pub max_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationPlan {
    pub students_per_page: usize,
    pub total_pages: usize,
    pub pages: Vec<Vec<String>>,
}

impl PaginationPlan {
    pub fn page(&self, index: usize) -> &[String] {
        self.pages.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn pages_needed(count: usize, per_page: usize) -> usize {
    count.div_ceil(per_page)
}

/// Splits an already sorted student list into contiguous pages of at most
/// `per_page` names. Needing more than `max_pages` is a capacity failure.
pub fn plan_pages(
    students: &[String],
    per_page: usize,
    max_pages: usize,
) -> Result<PaginationPlan, CapacityError> {
    let per_page = per_page.max(1);
    let total_pages = pages_needed(students.len(), per_page);
    if total_pages > max_pages {
        return Err(CapacityError {
            students: students.len(),
            capacity: per_page * max_pages,
            max_pages,
        });
    }
    Ok(PaginationPlan {
        students_per_page: per_page,
        total_pages,
        pages: students.chunks(per_page).map(<[String]>::to_vec).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Student{:03}, First", i)).collect()
    }

    fn plan(n: usize) -> Result<PaginationPlan, CapacityError> {
        plan_pages(&names(n), STUDENTS_PER_PAGE, TEMPLATE_PAGES)
    }

    #[test]
    fn page_counts_at_the_edges() {
        let p = plan(34).expect("34");
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.pages[0].len(), 34);

        let p = plan(35).expect("35");
        assert_eq!(p.total_pages, 2);
        assert_eq!(
            p.pages.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![34, 1]
        );

        let p = plan(136).expect("136");
        assert_eq!(p.total_pages, 4);
        assert!(p.pages.iter().all(|pg| pg.len() == 34));
    }

    #[test]
    fn over_capacity_is_named_failure() {
        let err = plan(137).expect_err("137");
        assert_eq!(err.capacity, 136);
        assert!(err.to_string().contains("exceeding maximum capacity of 136 students"));
    }

    #[test]
    fn pages_concatenate_to_input() {
        let all = names(95);
        let p = plan_pages(&all, STUDENTS_PER_PAGE, TEMPLATE_PAGES).expect("95");
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.pages.concat(), all);
        assert!(p.page(3).is_empty());
    }

    #[test]
    fn empty_group_needs_no_pages() {
        let p = plan(0).expect("0");
        assert_eq!(p.total_pages, 0);
        assert!(p.pages.is_empty());
    }
}
