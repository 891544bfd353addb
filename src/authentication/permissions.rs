use crate::{error::Error, jwt::SessionData, schema::Recipe};

/// Actions that only the author of a recipe may perform.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ActionType {
    UpdateRecipe,
    DeleteRecipe,
}

impl ActionType {
    fn denial(&self) -> &'static str {
        match self {
            ActionType::UpdateRecipe => "Only the author may update this recipe",
            ActionType::DeleteRecipe => "Only the author may delete this recipe",
        }
    }
}

impl SessionData {
    pub fn authorize(&self, action: ActionType, recipe: &Recipe) -> Result<(), Error> {
        if recipe.author_id != self.user_id {
            log::debug!(
                "> Denied {action:?} on recipe {} for user {}",
                recipe.id,
                self.user_id
            );
            return Err(Error::permission(action.denial()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn recipe(author_id: i32) -> Recipe {
        Recipe {
            id: 1,
            author_id,
            name: "Soup".to_string(),
            text: String::new(),
            cooking_time: 1,
            image: String::new(),
            pub_date: Utc::now(),
        }
    }

    #[test]
    fn test_only_author_is_authorized() {
        let session = SessionData {
            user_id: 3,
            username: "cook".to_string(),
        };

        assert!(session
            .authorize(ActionType::UpdateRecipe, &recipe(3))
            .is_ok());
        assert!(matches!(
            session.authorize(ActionType::DeleteRecipe, &recipe(4)),
            Err(Error::Permission(_))
        ));
    }
}
