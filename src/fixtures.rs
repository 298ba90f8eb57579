//! The fixed set of entries written into every fixture image.

/// One entry of the fixture tree, relative to the volume root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureEntry {
    Directory { path: &'static str },
    File { path: &'static str, contents: &'static str },
    Symlink { path: &'static str, target: &'static str },
}

impl FixtureEntry {
    pub fn path(&self) -> &'static str {
        match self {
            FixtureEntry::Directory { path }
            | FixtureEntry::File { path, .. }
            | FixtureEntry::Symlink { path, .. } => path,
        }
    }
}

pub const A_FILE_CONTENTS: &str = "This is a text file.\nWe should be able to parse it.\n";

pub const PASSWORDS_CONTENTS: &str = "place,user,password\n\
bank,joesmith,superrich\n\
alarm system,-,1234\n\
treasure chest,-,1111\n\
uber secret laire,admin,admin\n";

pub const ANOTHER_FILE_CONTENTS: &str = "This is another file.\n";

/// Entries in creation order. Parents and link targets come first.
pub const FIXTURE_SET: &[FixtureEntry] = &[
    FixtureEntry::Directory { path: "a_directory" },
    FixtureEntry::File {
        path: "a_directory/a_file",
        contents: A_FILE_CONTENTS,
    },
    FixtureEntry::File {
        path: "passwords.txt",
        contents: PASSWORDS_CONTENTS,
    },
    FixtureEntry::File {
        path: "a_directory/another_file",
        contents: ANOTHER_FILE_CONTENTS,
    },
    FixtureEntry::Symlink {
        path: "a_link",
        target: "a_directory/another_file",
    },
];

/// Names expected directly under the volume root.
pub fn root_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = FIXTURE_SET
        .iter()
        .map(FixtureEntry::path)
        .filter(|p| !p.contains('/'))
        .collect();
    names.sort_unstable();
    names
}

/// Literal contents of the fixture file at `path`, if it is one.
pub fn file_contents(path: &str) -> Option<&'static str> {
    FIXTURE_SET.iter().find_map(|e| match e {
        FixtureEntry::File { path: p, contents } if *p == path => Some(*contents),
        _ => None,
    })
}
