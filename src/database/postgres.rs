use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, QueryBuilder, Transaction};

use super::{
    error::Error,
    schema::{
        CartLine, Id, Ingredient, IngredientLine, NewIngredient, NewRecipe, NewTag, NewUser,
        Recipe, RecipeChanges, RecipeFilter, RecipeIngredient, RecipeRow, Relation, Tag, User,
    },
    store::Store,
};

// Keeps a single INSERT well below the 65535 bind parameter limit.
const INSERT_CHUNK: usize = 1000;

#[derive(sqlx::FromRow)]
struct UserRow {
    #[sqlx(flatten)]
    user: User,
    count: i64,
}

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    /// Connects and brings the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("> Database migrations applied");

        Ok(Self { pool })
    }
}

async fn insert_recipe_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), Error> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query.push_values(tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    query.build().execute(&mut **tx).await?;

    Ok(())
}

async fn insert_recipe_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    lines: &[IngredientLine],
) -> Result<(), Error> {
    if lines.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query.push_values(lines, |mut row, line| {
        row.push_bind(recipe_id)
            .push_bind(line.id)
            .push_bind(line.amount);
    });
    query.build().execute(&mut **tx).await?;

    Ok(())
}

async fn missing_ids(pool: &Pool<Postgres>, table: &str, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let missing: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT wanted.id FROM UNNEST($1::INTEGER[]) AS wanted(id) \
         WHERE NOT EXISTS (SELECT 1 FROM {table} t WHERE t.id = wanted.id)"
    ))
    .bind(ids.to_vec())
    .fetch_all(pool)
    .await?;

    Ok(missing.into_iter().map(|row| row.0).collect())
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, Error> {
        let row: User = sqlx::query_as(
            "
            INSERT INTO users (email, username, first_name, last_name, password)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
        )
        .bind(user.email)
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.password)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), Error> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = rows.first().map(|row| row.count).unwrap_or(0);
        Ok((rows.into_iter().map(|row| row.user).collect(), total))
    }

    async fn set_password(&self, id: Id, password: &str) -> Result<(), Error> {
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_user(&self, id: Id) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_tag(&self, tag: NewTag) -> Result<Tag, Error> {
        let row: Tag =
            sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
                .bind(tag.name)
                .bind(tag.color)
                .bind(tag.slug)
                .fetch_one(&self.pool)
                .await?;

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, Error> {
        let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn missing_tags(&self, ids: &[Id]) -> Result<Vec<Id>, Error> {
        missing_ids(&self.pool, "tags", ids).await
    }

    async fn insert_ingredients(&self, ingredients: Vec<NewIngredient>) -> Result<u64, Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in ingredients.chunks(INSERT_CHUNK) {
            let mut query: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
            query.push_values(chunk, |mut row, ingredient| {
                row.push_bind(ingredient.name.to_owned())
                    .push_bind(ingredient.measurement_unit.to_owned());
            });
            inserted += query.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_ingredients(&self, name: Option<&str>) -> Result<Vec<Ingredient>, Error> {
        let rows: Vec<Ingredient> = match name {
            Some(name) => {
                sqlx::query_as(
                    "SELECT * FROM ingredients WHERE STRPOS(LOWER(name), LOWER($1)) = 1 ORDER BY id",
                )
                .bind(name)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM ingredients ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows)
    }

    async fn get_ingredient(&self, id: Id) -> Result<Option<Ingredient>, Error> {
        let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn missing_ingredients(&self, ids: &[Id]) -> Result<Vec<Id>, Error> {
        missing_ids(&self.pool, "ingredients", ids).await
    }

    async fn insert_recipe(&self, recipe: NewRecipe) -> Result<Id, Error> {
        let mut tx = self.pool.begin().await?;

        let id: (Id,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, cooking_time, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ",
        )
        .bind(recipe.author_id)
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(recipe.cooking_time)
        .bind(&recipe.image)
        .fetch_one(&mut *tx)
        .await?;

        insert_recipe_tags(&mut tx, id.0, &recipe.tags).await?;
        insert_recipe_ingredients(&mut tx, id.0, &recipe.ingredients).await?;

        tx.commit().await?;
        Ok(id.0)
    }

    async fn update_recipe(&self, id: Id, changes: RecipeChanges) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE recipes SET id = id");
        if let Some(name) = changes.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(text) = changes.text {
            query.push(", text = ").push_bind(text);
        }
        if let Some(cooking_time) = changes.cooking_time {
            query.push(", cooking_time = ").push_bind(cooking_time);
        }
        if let Some(image) = changes.image {
            query.push(", image = ").push_bind(image);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Recipe does not exist"));
        }

        if let Some(tags) = changes.tags {
            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_recipe_tags(&mut tx, id, &tags).await?;
        }

        if let Some(lines) = changes.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_recipe_ingredients(&mut tx, id, &lines).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn recipe_tags(&self, id: Id) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.* FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.id
        ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn recipe_ingredients(&self, id: Id) -> Result<Vec<RecipeIngredient>, Error> {
        let rows: Vec<RecipeIngredient> = sqlx::query_as("
            SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY ri.id
        ")
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_recipes(
        &self,
        filter: &RecipeFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Recipe>, i64), Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

        if !filter.tags.is_empty() {
            query
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                     WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(filter.tags.clone())
                .push("))");
        }
        if let Some(author) = filter.author {
            query.push(" AND r.author_id = ").push_bind(author);
        }
        if let Some(user_id) = filter.favorited_by {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if let Some(user_id) = filter.in_cart_of {
            query
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(user_id)
                .push(")");
        }

        query
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let total = rows.first().map(|row| row.count).unwrap_or(0);
        Ok((rows.into_iter().map(|row| row.recipe).collect(), total))
    }

    async fn author_recipes(
        &self,
        author_id: Id,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error> {
        // LIMIT NULL is LIMIT ALL
        let rows: Vec<Recipe> = sqlx::query_as(
            "SELECT * FROM recipes WHERE author_id = $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_author_recipes(&self, author_id: Id) -> Result<i64, Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn insert_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            relation.table(),
            relation.target_column()
        ))
        .bind(owner)
        .bind(target)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
            relation.table(),
            relation.target_column()
        ))
        .bind(owner)
        .bind(target)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_pair(&self, relation: Relation, owner: Id, target: Id) -> Result<bool, Error> {
        let row: Option<(Id,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE user_id = $1 AND {} = $2",
            relation.table(),
            relation.target_column()
        ))
        .bind(owner)
        .bind(target)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn pair_targets(
        &self,
        relation: Relation,
        owner: Id,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Id>, i64), Error> {
        let rows: Vec<(Id, i64)> = sqlx::query_as(&format!(
            "SELECT {}, COUNT(*) OVER() FROM {} WHERE user_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
            relation.target_column(),
            relation.table()
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = rows.first().map(|row| row.1).unwrap_or(0);
        Ok((rows.into_iter().map(|row| row.0).collect(), total))
    }

    async fn cart_lines(&self, user_id: Id) -> Result<Vec<CartLine>, Error> {
        let rows: Vec<CartLine> = sqlx::query_as(
            "
            SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM shopping_cart c
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            ORDER BY c.id, ri.id
        ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
