use std::fmt::Display;

/// One alternative of a format selection, e.g. `137+141` or `best[height=1080]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause(String);

impl Clause {
    pub fn new<S: Into<String>>(clause: S) -> Self {
        Self(clause.into())
    }

    /// A primary stream merged with a companion stream
    pub fn merged(primary: &str, companion: &str) -> Self {
        Self(format!("{primary}+{companion}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the clause matches as long as the video has any stream
    /// of the wanted type, i.e. it carries no filter nor format ID.
    pub fn is_catch_all(&self) -> bool {
        matches!(self.0.as_str(), "best" | "b" | "bestaudio" | "ba")
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered format alternatives evaluated left to right by yt-dlp.
///
/// Always terminates with a catch-all clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    clauses: Vec<Clause>,
}

impl FormatSelection {
    /// Build a selection from clauses ordered from highest to lowest quality.
    ///
    /// `catch_all` is appended unless the last clause already is one.
    pub fn new(clauses: Vec<Clause>, catch_all: Clause) -> Self {
        let mut clauses = clauses;
        if !clauses.last().is_some_and(Clause::is_catch_all) {
            clauses.push(catch_all);
        }
        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn first(&self) -> &Clause {
        // `new` always pushes at least the catch-all
        &self.clauses[0]
    }

    pub fn last(&self) -> &Clause {
        &self.clauses[self.clauses.len() - 1]
    }
}

impl Display for FormatSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for clause in &self.clauses {
            if !first {
                f.write_str("/")?;
            }
            first = false;
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_missing_catch_all() {
        let selection = FormatSelection::new(
            vec![Clause::merged("137", "141"), Clause::new("best[height=1080]")],
            Clause::new("best"),
        );
        assert_eq!(selection.to_string(), "137+141/best[height=1080]/best");
        assert!(selection.last().is_catch_all());
    }

    #[test]
    fn keeps_existing_catch_all() {
        let selection = FormatSelection::new(
            vec![Clause::new("140"), Clause::new("bestaudio")],
            Clause::new("best"),
        );
        assert_eq!(selection.to_string(), "140/bestaudio");
    }

    #[test]
    fn empty_selection_is_catch_all() {
        let selection = FormatSelection::new(vec![], Clause::new("bestaudio"));
        assert_eq!(selection.to_string(), "bestaudio");
        assert_eq!(selection.first(), selection.last());
    }

    #[test]
    fn filtered_clause_is_not_catch_all() {
        assert!(!Clause::new("best[height<=720]").is_catch_all());
        assert!(!Clause::new("bestaudio[ext=m4a]").is_catch_all());
        assert!(!Clause::new("22").is_catch_all());
    }
}
