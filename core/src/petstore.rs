//! Generated bindings for the petstore document.
//!
//! `operations()` is the descriptor table a generator emits for the
//! document; the `*Api` types are the typed facades over the generic
//! `Client`, one method per operation.

use uuid::Uuid;

use crate::binder::Args;
use crate::client::{ApiResult, Client, ClientFactory};
use crate::config::ClientConfig;
use crate::descriptor::{
    OperationDescriptor, ParameterSpec, ValueType, FORM_URLENCODED, TEXT_PLAIN,
};
use crate::error::ConfigError;
use crate::http::HttpMethod;
use crate::types::{self, Order, Pet, PetForm, PetStatus, User};

/// Operation names as exposed by the client.
pub mod operation {
    pub const CALL_123_TEST_SPECIAL_TAGS: &str = "call123testSpecialTags";
    pub const ADD_PET: &str = "addPet";
    pub const UPDATE_PET: &str = "updatePet";
    pub const FIND_PETS_BY_STATUS: &str = "findPetsByStatus";
    pub const GET_PET_BY_ID: &str = "getPetById";
    pub const DELETE_PET: &str = "deletePet";
    pub const UPDATE_PET_WITH_FORM: &str = "updatePetWithForm";
    pub const PLACE_ORDER: &str = "placeOrder";
    pub const GET_ORDER_BY_ID: &str = "getOrderById";
    pub const DELETE_ORDER: &str = "deleteOrder";
    pub const CREATE_USER: &str = "createUser";
    pub const GET_USER_BY_NAME: &str = "getUserByName";
    pub const LOGIN_USER: &str = "loginUser";
}

/// Descriptor table for every bound petstore operation.
pub fn operations() -> Result<Vec<OperationDescriptor>, ConfigError> {
    use operation::*;

    let pet = || ValueType::object("Pet");
    let order = || ValueType::object("Order");

    Ok(vec![
        OperationDescriptor::builder(CALL_123_TEST_SPECIAL_TAGS, HttpMethod::Patch, "/another-fake/dummy")
            .param(ParameterSpec::header("uuid_test", ValueType::Uuid, true))
            .param(ParameterSpec::body("body", ValueType::object("Client"), true))
            .responds_with(ValueType::object("Client"))
            .build()?,
        OperationDescriptor::builder(ADD_PET, HttpMethod::Post, "/pet")
            .param(ParameterSpec::body("pet", pet(), true))
            .responds_with(pet())
            .build()?,
        OperationDescriptor::builder(UPDATE_PET, HttpMethod::Put, "/pet")
            .param(ParameterSpec::body("pet", pet(), true))
            .responds_with(pet())
            .build()?,
        OperationDescriptor::builder(FIND_PETS_BY_STATUS, HttpMethod::Get, "/pet/findByStatus")
            .param(ParameterSpec::query(
                "status",
                ValueType::array(ValueType::enumeration(PetStatus::WIRE_NAMES)),
                true,
            ))
            .responds_with(ValueType::array(pet()))
            .build()?,
        OperationDescriptor::builder(GET_PET_BY_ID, HttpMethod::Get, "/pet/{petId}")
            .param(ParameterSpec::path("petId", ValueType::Integer))
            .responds_with(pet())
            .build()?,
        OperationDescriptor::builder(DELETE_PET, HttpMethod::Delete, "/pet/{petId}")
            .param(ParameterSpec::path("petId", ValueType::Integer))
            .param(ParameterSpec::header("api_key", ValueType::String, false))
            .build()?,
        OperationDescriptor::builder(UPDATE_PET_WITH_FORM, HttpMethod::Post, "/pet/{petId}")
            .param(ParameterSpec::path("petId", ValueType::Integer))
            .param(ParameterSpec::body("form", ValueType::object("PetForm"), true))
            .consumes(FORM_URLENCODED)
            .build()?,
        OperationDescriptor::builder(PLACE_ORDER, HttpMethod::Post, "/store/order")
            .param(ParameterSpec::body("order", order(), true))
            .responds_with(order())
            .build()?,
        OperationDescriptor::builder(GET_ORDER_BY_ID, HttpMethod::Get, "/store/order/{orderId}")
            .param(ParameterSpec::path("orderId", ValueType::Integer))
            .responds_with(order())
            .build()?,
        OperationDescriptor::builder(DELETE_ORDER, HttpMethod::Delete, "/store/order/{orderId}")
            .param(ParameterSpec::path("orderId", ValueType::Integer))
            .build()?,
        OperationDescriptor::builder(CREATE_USER, HttpMethod::Post, "/user")
            .param(ParameterSpec::body("user", ValueType::object("User"), true))
            .build()?,
        OperationDescriptor::builder(GET_USER_BY_NAME, HttpMethod::Get, "/user/{username}")
            .param(ParameterSpec::path("username", ValueType::String))
            .responds_with(ValueType::object("User"))
            .build()?,
        OperationDescriptor::builder(LOGIN_USER, HttpMethod::Get, "/user/login")
            .param(ParameterSpec::query("username", ValueType::String, true))
            .param(ParameterSpec::query("password", ValueType::String, true))
            .produces(TEXT_PLAIN)
            .responds_with(ValueType::String)
            .build()?,
    ])
}

/// Build a client bound to every petstore operation.
pub fn client(config: ClientConfig) -> Result<Client, ConfigError> {
    ClientFactory::build(operations()?, config)
}

#[derive(Debug, Clone)]
pub struct AnotherFakeApi {
    client: Client,
}

impl AnotherFakeApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// To test special tags and operation ID starting with number.
    pub async fn call_123_test_special_tags(
        &self,
        uuid_test: Uuid,
        body: &types::Client,
    ) -> ApiResult<types::Client> {
        let args = Args::new().arg("uuid_test", &uuid_test)?.arg("body", body)?;
        self.client
            .invoke(operation::CALL_123_TEST_SPECIAL_TAGS, args)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct PetApi {
    client: Client,
}

impl PetApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn add_pet(&self, pet: &Pet) -> ApiResult<Pet> {
        let args = Args::new().arg("pet", pet)?;
        self.client.invoke(operation::ADD_PET, args).await
    }

    pub async fn update_pet(&self, pet: &Pet) -> ApiResult<Pet> {
        let args = Args::new().arg("pet", pet)?;
        self.client.invoke(operation::UPDATE_PET, args).await
    }

    pub async fn find_pets_by_status(&self, status: &[PetStatus]) -> ApiResult<Vec<Pet>> {
        let args = Args::new().arg("status", status)?;
        self.client.invoke(operation::FIND_PETS_BY_STATUS, args).await
    }

    pub async fn get_pet_by_id(&self, pet_id: i64) -> ApiResult<Pet> {
        let args = Args::new().arg("petId", &pet_id)?;
        self.client.invoke(operation::GET_PET_BY_ID, args).await
    }

    pub async fn delete_pet(&self, pet_id: i64, api_key: Option<&str>) -> ApiResult<()> {
        let args = Args::new().arg("petId", &pet_id)?.arg("api_key", &api_key)?;
        self.client.invoke(operation::DELETE_PET, args).await
    }

    pub async fn update_pet_with_form(&self, pet_id: i64, form: &PetForm) -> ApiResult<()> {
        let args = Args::new().arg("petId", &pet_id)?.arg("form", form)?;
        self.client.invoke(operation::UPDATE_PET_WITH_FORM, args).await
    }
}

#[derive(Debug, Clone)]
pub struct StoreApi {
    client: Client,
}

impl StoreApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn place_order(&self, order: &Order) -> ApiResult<Order> {
        let args = Args::new().arg("order", order)?;
        self.client.invoke(operation::PLACE_ORDER, args).await
    }

    pub async fn get_order_by_id(&self, order_id: i64) -> ApiResult<Order> {
        let args = Args::new().arg("orderId", &order_id)?;
        self.client.invoke(operation::GET_ORDER_BY_ID, args).await
    }

    pub async fn delete_order(&self, order_id: i64) -> ApiResult<()> {
        let args = Args::new().arg("orderId", &order_id)?;
        self.client.invoke(operation::DELETE_ORDER, args).await
    }
}

#[derive(Debug, Clone)]
pub struct UserApi {
    client: Client,
}

impl UserApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn create_user(&self, user: &User) -> ApiResult<()> {
        let args = Args::new().arg("user", user)?;
        self.client.invoke(operation::CREATE_USER, args).await
    }

    pub async fn get_user_by_name(&self, username: &str) -> ApiResult<User> {
        let args = Args::new().arg("username", username)?;
        self.client.invoke(operation::GET_USER_BY_NAME, args).await
    }

    /// Returns the session token as plain text.
    pub async fn login_user(&self, username: &str, password: &str) -> ApiResult<String> {
        let args = Args::new()
            .arg("username", username)?
            .arg("password", password)?;
        self.client.invoke(operation::LOGIN_USER, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamKind;

    #[test]
    fn table_is_valid_and_unique() {
        let ops = operations().unwrap();
        assert_eq!(ops.len(), 13);
        let config = ClientConfig::builder("http://petstore.swagger.io:80/v2")
            .build()
            .unwrap();
        let client = client(config).unwrap();
        assert_eq!(client.operations().count(), 13);
    }

    #[test]
    fn special_tags_operation_shape() {
        let ops = operations().unwrap();
        let op = ops
            .iter()
            .find(|op| op.name() == operation::CALL_123_TEST_SPECIAL_TAGS)
            .unwrap();
        assert_eq!(op.method(), HttpMethod::Patch);
        assert_eq!(op.path_template(), "/another-fake/dummy");
        let header = op.parameter("uuid_test").unwrap();
        assert_eq!(header.kind, ParamKind::Header);
        assert_eq!(header.value_type, ValueType::Uuid);
        assert!(header.required);
        assert_eq!(op.body_type(), Some(&ValueType::object("Client")));
    }
}
