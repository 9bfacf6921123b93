//! The SharePoint Lists web service (`_vti_bin/Lists.asmx`) as a descriptor
//! table, plus a typed client over it.
//!
//! Every request field is optional except `AddList`'s `templateID`, and every
//! result is optional, as declared by the service's WSDL.

use splists_util::{QualifiedName, XmlElement};

use crate::{
    client::Client,
    descriptor::{MessageDescriptor, OperationRegistry},
    error::Error,
    field::{FieldDescriptor, FieldKind, FieldValue, Fields},
    transport::{HttpTransport, Transport},
};

pub const NAMESPACE: &str = "http://schemas.microsoft.com/sharepoint/soap/";

pub const GET_LIST: &str = "GetList";
pub const GET_LIST_AND_VIEW: &str = "GetListAndView";
pub const DELETE_LIST: &str = "DeleteList";
pub const ADD_LIST: &str = "AddList";
pub const UPDATE_LIST: &str = "UpdateList";
pub const GET_LIST_COLLECTION: &str = "GetListCollection";
pub const GET_LIST_ITEMS: &str = "GetListItems";
pub const GET_LIST_ITEM_CHANGES: &str = "GetListItemChanges";
pub const UPDATE_LIST_ITEMS: &str = "UpdateListItems";
pub const GET_ATTACHMENT_COLLECTION: &str = "GetAttachmentCollection";
pub const ADD_ATTACHMENT: &str = "AddAttachment";
pub const DELETE_ATTACHMENT: &str = "DeleteAttachment";

fn optional(name: &str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor::new(QualifiedName::new(NAMESPACE, name), kind).optional()
}

fn text(name: &str) -> FieldDescriptor {
    optional(name, FieldKind::String)
}

fn xml(name: &str) -> FieldDescriptor {
    optional(name, FieldKind::OpaqueXml)
}

fn operation(name: &str, action: &str) -> MessageDescriptor {
    MessageDescriptor::new(NAMESPACE, name, action)
}

pub fn registry() -> OperationRegistry {
    OperationRegistry::new()
        .with(
            operation(GET_LIST, "http://schemas.microsoft.com/sharepoint/soap/GetList")
                .request_field(text("listName"))
                .result(xml("GetListResult")),
        )
        .with(
            operation(
                GET_LIST_AND_VIEW,
                "http://schemas.microsoft.com/sharepoint/soap/GetListAndView",
            )
            .request_field(text("listName"))
            .request_field(text("viewName"))
            .result(xml("GetListAndViewResult")),
        )
        .with(
            operation(DELETE_LIST, "http://schemas.microsoft.com/sharepoint/soap/DeleteList")
                .request_field(text("listName")),
        )
        .with(
            operation(ADD_LIST, "http://schemas.microsoft.com/sharepoint/soap/AddList")
                .request_field(text("listName"))
                .request_field(text("description"))
                .request_field(FieldDescriptor::new(
                    QualifiedName::new(NAMESPACE, "templateID"),
                    FieldKind::Int,
                ))
                .result(xml("AddListResult")),
        )
        .with(
            operation(UPDATE_LIST, "http://schemas.microsoft.com/sharepoint/soap/UpdateList")
                .request_field(text("listName"))
                .request_field(xml("listProperties"))
                .request_field(xml("newFields"))
                .request_field(xml("updateFields"))
                .request_field(xml("deleteFields"))
                .request_field(text("listVersion"))
                .result(xml("UpdateListResult")),
        )
        .with(
            operation(
                GET_LIST_COLLECTION,
                "http://schemas.microsoft.com/sharepoint/soap/GetListCollection",
            )
            .result(xml("GetListCollectionResult")),
        )
        .with(
            operation(GET_LIST_ITEMS, "http://schemas.microsoft.com/sharepoint/soap/GetListItems")
                .request_field(text("listName"))
                .request_field(text("viewName"))
                // The service only honours orderBy right after query.
                .request_field(xml("query").with_trailing(xml("orderBy")))
                .request_field(xml("viewFields"))
                .request_field(text("rowLimit"))
                .request_field(xml("queryOptions"))
                .request_field(text("webID"))
                .result(xml("GetListItemsResult")),
        )
        .with(
            operation(
                GET_LIST_ITEM_CHANGES,
                "http://schemas.microsoft.com/sharepoint/soap/GetListItemChanges",
            )
            .request_field(text("listName"))
            .request_field(xml("viewFields"))
            .request_field(text("since"))
            .request_field(xml("contains"))
            .result(xml("GetListItemChangesResult")),
        )
        .with(
            operation(
                UPDATE_LIST_ITEMS,
                "http://schemas.microsoft.com/sharepoint/soap/UpdateListItems",
            )
            .request_field(text("listName"))
            .request_field(xml("updates"))
            .result(xml("UpdateListItemsResult")),
        )
        .with(
            operation(
                GET_ATTACHMENT_COLLECTION,
                "http://schemas.microsoft.com/sharepoint/soap/GetAttachmentCollection",
            )
            .request_field(text("listName"))
            .request_field(text("listItemID"))
            .result(xml("GetAttachmentCollectionResult")),
        )
        .with(
            operation(ADD_ATTACHMENT, "http://schemas.microsoft.com/sharepoint/soap/AddAttachment")
                .request_field(text("listName"))
                .request_field(text("listItemID"))
                .request_field(text("fileName"))
                .request_field(optional("attachment", FieldKind::Base64Binary))
                .result(text("AddAttachmentResult")),
        )
        .with(
            operation(
                DELETE_ATTACHMENT,
                "http://schemas.microsoft.com/sharepoint/soap/DeleteAttachment",
            )
            .request_field(text("listName"))
            .request_field(text("listItemID"))
            .request_field(text("url")),
        )
}

trait SetOptional {
    fn set_optional<V: Into<FieldValue>>(&mut self, name: &str, value: Option<V>);
}

impl SetOptional for Fields {
    fn set_optional<V: Into<FieldValue>>(&mut self, name: &str, value: Option<V>) {
        if let Some(value) = value {
            self.insert(name, value);
        }
    }
}

/// Arguments of `GetListItems`. `None` leaves the element out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetListItemsRequest {
    pub list_name: String,
    pub view_name: Option<String>,
    /// A CAML `<Query>` element.
    pub query: Option<XmlElement>,
    /// A CAML `<OrderBy>` element. Only sent together with `query`.
    pub order_by: Option<XmlElement>,
    pub view_fields: Option<XmlElement>,
    pub row_limit: Option<u32>,
    pub query_options: Option<XmlElement>,
    pub web_id: Option<String>,
}

impl GetListItemsRequest {
    pub fn new<S: Into<String>>(list_name: S) -> Self {
        Self {
            list_name: list_name.into(),
            ..Self::default()
        }
    }

    fn into_fields(self) -> Fields {
        let mut fields = Fields::new().with("listName", self.list_name);
        fields.set_optional("viewName", self.view_name);
        fields.set_optional("query", self.query);
        fields.set_optional("orderBy", self.order_by);
        fields.set_optional("viewFields", self.view_fields);
        fields.set_optional("rowLimit", self.row_limit.map(|limit| limit.to_string()));
        fields.set_optional("queryOptions", self.query_options);
        fields.set_optional("webID", self.web_id);
        fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateListRequest {
    pub list_name: String,
    pub list_properties: Option<XmlElement>,
    pub new_fields: Option<XmlElement>,
    pub update_fields: Option<XmlElement>,
    pub delete_fields: Option<XmlElement>,
    pub list_version: Option<String>,
}

impl UpdateListRequest {
    fn into_fields(self) -> Fields {
        let mut fields = Fields::new().with("listName", self.list_name);
        fields.set_optional("listProperties", self.list_properties);
        fields.set_optional("newFields", self.new_fields);
        fields.set_optional("updateFields", self.update_fields);
        fields.set_optional("deleteFields", self.delete_fields);
        fields.set_optional("listVersion", self.list_version);
        fields
    }
}

/// One method per Lists operation. XML results are returned without their
/// `...Result` wrapper element.
#[derive(Debug, Clone)]
pub struct ListsClient<T = HttpTransport> {
    client: Client<T>,
}

impl<T: Transport> ListsClient<T> {
    pub fn new(client: Client<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    fn xml_result(&self, operation: &str, fields: Fields) -> Result<Option<XmlElement>, Error> {
        let mut response = self.client.invoke(operation, &fields)?;
        let result = format!("{}Result", operation);

        Ok(response
            .take_xml(&result)
            .and_then(XmlElement::into_first_element))
    }

    pub fn get_list(&self, list_name: &str) -> Result<Option<XmlElement>, Error> {
        self.xml_result(GET_LIST, Fields::new().with("listName", list_name))
    }

    pub fn get_list_and_view(
        &self,
        list_name: &str,
        view_name: Option<&str>,
    ) -> Result<Option<XmlElement>, Error> {
        let mut fields = Fields::new().with("listName", list_name);
        fields.set_optional("viewName", view_name);
        self.xml_result(GET_LIST_AND_VIEW, fields)
    }

    pub fn delete_list(&self, list_name: &str) -> Result<(), Error> {
        self.client
            .invoke(DELETE_LIST, &Fields::new().with("listName", list_name))?;
        Ok(())
    }

    pub fn add_list(
        &self,
        list_name: &str,
        description: &str,
        template_id: i32,
    ) -> Result<Option<XmlElement>, Error> {
        let fields = Fields::new()
            .with("listName", list_name)
            .with("description", description)
            .with("templateID", template_id);
        self.xml_result(ADD_LIST, fields)
    }

    pub fn update_list(&self, request: UpdateListRequest) -> Result<Option<XmlElement>, Error> {
        self.xml_result(UPDATE_LIST, request.into_fields())
    }

    pub fn get_list_collection(&self) -> Result<Option<XmlElement>, Error> {
        self.xml_result(GET_LIST_COLLECTION, Fields::new())
    }

    pub fn get_list_items(
        &self,
        request: GetListItemsRequest,
    ) -> Result<Option<XmlElement>, Error> {
        self.xml_result(GET_LIST_ITEMS, request.into_fields())
    }

    pub fn get_list_item_changes(
        &self,
        list_name: &str,
        view_fields: Option<XmlElement>,
        since: Option<&str>,
        contains: Option<XmlElement>,
    ) -> Result<Option<XmlElement>, Error> {
        let mut fields = Fields::new().with("listName", list_name);
        fields.set_optional("viewFields", view_fields);
        fields.set_optional("since", since);
        fields.set_optional("contains", contains);
        self.xml_result(GET_LIST_ITEM_CHANGES, fields)
    }

    /// `updates` is a CAML `<Batch>` element.
    pub fn update_list_items(
        &self,
        list_name: &str,
        updates: XmlElement,
    ) -> Result<Option<XmlElement>, Error> {
        let fields = Fields::new()
            .with("listName", list_name)
            .with("updates", updates);
        self.xml_result(UPDATE_LIST_ITEMS, fields)
    }

    pub fn get_attachment_collection(
        &self,
        list_name: &str,
        list_item_id: &str,
    ) -> Result<Option<XmlElement>, Error> {
        let fields = Fields::new()
            .with("listName", list_name)
            .with("listItemID", list_item_id);
        self.xml_result(GET_ATTACHMENT_COLLECTION, fields)
    }

    /// Returns the URL of the new attachment.
    pub fn add_attachment(
        &self,
        list_name: &str,
        list_item_id: &str,
        file_name: &str,
        attachment: &[u8],
    ) -> Result<Option<String>, Error> {
        let fields = Fields::new()
            .with("listName", list_name)
            .with("listItemID", list_item_id)
            .with("fileName", file_name)
            .with("attachment", attachment.to_vec());

        let mut response = self.client.invoke(ADD_ATTACHMENT, &fields)?;
        Ok(response.take_text("AddAttachmentResult"))
    }

    pub fn delete_attachment(
        &self,
        list_name: &str,
        list_item_id: &str,
        url: &str,
    ) -> Result<(), Error> {
        let fields = Fields::new()
            .with("listName", list_name)
            .with("listItemID", list_item_id)
            .with("url", url);

        self.client.invoke(DELETE_ATTACHMENT, &fields)?;
        Ok(())
    }
}
