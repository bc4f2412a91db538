/// Which team picks first each round.
///
/// `first_pick_is_subject` is reset to `true` on every advance, so the first picker always
/// chooses the subject and the next team in order chooses the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerRotation {
    first_picker_index: usize,
    first_pick_is_subject: bool,
}

impl Default for PickerRotation {
    fn default() -> Self {
        Self::start()
    }
}

impl PickerRotation {
    /// Rotation at game start: team 0 picks the subject.
    pub fn start() -> Self {
        Self {
            first_picker_index: 0,
            first_pick_is_subject: true,
        }
    }

    pub fn first_picker_index(&self) -> usize {
        self.first_picker_index
    }

    pub fn first_pick_is_subject(&self) -> bool {
        self.first_pick_is_subject
    }

    /// Move to the next round.
    pub fn advance(&mut self, team_count: usize) {
        self.first_picker_index = next_picker_index(self.first_picker_index, team_count);
        self.first_pick_is_subject = true;
    }

    pub fn subject_picker_index(&self, team_count: usize) -> usize {
        if self.first_pick_is_subject {
            self.first_picker_index
        } else {
            next_picker_index(self.first_picker_index, team_count)
        }
    }

    pub fn type_picker_index(&self, team_count: usize) -> usize {
        if self.first_pick_is_subject {
            next_picker_index(self.first_picker_index, team_count)
        } else {
            self.first_picker_index
        }
    }
}

/// `(current + 1) mod team_count`, staying at 0 when there are no teams.
pub fn next_picker_index(current: usize, team_count: usize) -> usize {
    if team_count == 0 {
        0
    } else {
        (current + 1) % team_count
    }
}
