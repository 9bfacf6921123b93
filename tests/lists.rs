mod common;

use common::{endpoint, envelope, RecordingTransport};
use splists::{
    codec, lists, Client, Error, GetListItemsRequest, ListsClient, QualifiedName, Reply, SoapFault,
    UpdateListRequest, XmlElement,
};
use std::sync::Arc;

const NS: &str = "http://schemas.microsoft.com/sharepoint/soap/";

fn lists_client(transport: RecordingTransport) -> ListsClient<Arc<RecordingTransport>> {
    ListsClient::new(Client::builder(endpoint()).build_with_transport(Arc::new(transport)))
}

fn caml(xml: &str) -> XmlElement {
    xml.parse().unwrap()
}

#[test]
fn get_list_items_places_order_by_after_query() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(
            r##"<GetListItemsResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/">
                  <GetListItemsResult>
                    <listitems xmlns:rs="urn:schemas-microsoft-com:rowset" xmlns:z="#RowsetSchema">
                      <rs:data ItemCount="1"><z:row ows_Title="First"/></rs:data>
                    </listitems>
                  </GetListItemsResult>
                </GetListItemsResponse>"##,
        ),
    );
    let client = lists_client(transport);

    let mut request = GetListItemsRequest::new("Tasks");
    request.query = Some(caml(
        r#"<Query><Where><Eq><FieldRef Name="Status"/><Value Type="Text">Open</Value></Eq></Where></Query>"#,
    ));
    request.order_by = Some(caml(r#"<OrderBy><FieldRef Name="Modified" Ascending="FALSE"/></OrderBy>"#));
    request.row_limit = Some(100);

    let items = client.get_list_items(request).unwrap().unwrap();
    assert_eq!(items.name.local_name(), "listitems");
    let data = items
        .child(&QualifiedName::new("urn:schemas-microsoft-com:rowset", "data"))
        .unwrap();
    assert_eq!(data.attribute(&"ItemCount".into()), Some("1"));

    let body = client.client().transport().last_body();
    let query = body.find("<query>").unwrap();
    let order_by = body.find("<orderBy>").unwrap();
    let row_limit = body.find("<rowLimit>100</rowLimit>").unwrap();
    assert!(query < order_by && order_by < row_limit);
    assert!(body.contains(r#"<FieldRef Name="Modified" Ascending="FALSE"></FieldRef>"#));
    assert!(!body.contains("viewName"));
}

#[test]
fn order_by_without_query_is_not_sent() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(r#"<GetListItemsResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"/>"#),
    );
    let client = lists_client(transport);

    let mut request = GetListItemsRequest::new("Tasks");
    request.order_by = Some(caml(r#"<OrderBy><FieldRef Name="ID"/></OrderBy>"#));

    assert_eq!(client.get_list_items(request).unwrap(), None);
    assert!(!client.client().transport().last_body().contains("orderBy"));
}

#[test]
fn add_list_sends_template_id() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(
            r#"<AddListResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"><AddListResult><List Title="X"/></AddListResult></AddListResponse>"#,
        ),
    );
    let client = lists_client(transport);

    let list = client.add_list("X", "Y", 100).unwrap().unwrap();
    assert_eq!(list.attribute(&"Title".into()), Some("X"));

    let body = client.client().transport().last_body();
    assert!(body.contains(
        "<listName>X</listName><description>Y</description><templateID>100</templateID>"
    ));
    assert_eq!(
        client.client().transport().sent()[0].header("SOAPAction"),
        Some("\"http://schemas.microsoft.com/sharepoint/soap/AddList\"")
    );
}

#[test]
fn add_attachment_sends_base64_and_returns_the_url() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(
            r#"<AddAttachmentResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"><AddAttachmentResult>http://sharepoint.example/Lists/Tasks/Attachments/3/notes.txt</AddAttachmentResult></AddAttachmentResponse>"#,
        ),
    );
    let client = lists_client(transport);

    let url = client
        .add_attachment("Tasks", "3", "notes.txt", b"hello world")
        .unwrap();
    assert_eq!(
        url.as_deref(),
        Some("http://sharepoint.example/Lists/Tasks/Attachments/3/notes.txt")
    );
    assert!(client
        .client()
        .transport()
        .last_body()
        .contains("<attachment>aGVsbG8gd29ybGQ=</attachment>"));
}

#[test]
fn update_list_items_wraps_the_batch() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(
            r#"<UpdateListItemsResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"><UpdateListItemsResult><Results/></UpdateListItemsResult></UpdateListItemsResponse>"#,
        ),
    );
    let client = lists_client(transport);

    let batch = caml(
        r#"<Batch OnError="Continue"><Method ID="1" Cmd="Delete"><Field Name="ID">7</Field></Method></Batch>"#,
    );
    let results = client.update_list_items("Tasks", batch).unwrap().unwrap();
    assert_eq!(results.name, QualifiedName::new(NS, "Results"));

    let body = client.client().transport().last_body();
    assert!(body.contains(
        r#"<updates><Batch xmlns="" OnError="Continue"><Method ID="1" Cmd="Delete"><Field Name="ID">7</Field></Method></Batch></updates>"#
    ));
}

#[test]
fn update_list_omits_unset_definitions() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(r#"<UpdateListResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"/>"#),
    );
    let client = lists_client(transport);

    let request = UpdateListRequest {
        list_name: "Tasks".to_owned(),
        list_properties: Some(caml(r#"<List Title="Renamed"/>"#)),
        list_version: Some("3".to_owned()),
        ..UpdateListRequest::default()
    };
    assert_eq!(client.update_list(request).unwrap(), None);

    let body = client.client().transport().last_body();
    assert!(body.contains("<listVersion>3</listVersion>"));
    assert!(!body.contains("newFields"));
    assert!(!body.contains("deleteFields"));
}

#[test]
fn delete_attachment_and_get_collection() {
    let transport = RecordingTransport::new()
        .reply(
            200,
            envelope(r#"<DeleteAttachmentResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"/>"#),
        )
        .reply(
            200,
            envelope(
                r#"<GetAttachmentCollectionResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"><GetAttachmentCollectionResult><Attachments><Attachment>http://a/1</Attachment></Attachments></GetAttachmentCollectionResult></GetAttachmentCollectionResponse>"#,
            ),
        );
    let client = lists_client(transport);

    client.delete_attachment("Tasks", "3", "http://a/0").unwrap();
    let attachments = client.get_attachment_collection("Tasks", "3").unwrap().unwrap();
    let first = attachments
        .child(&QualifiedName::new(NS, "Attachment"))
        .unwrap();
    assert_eq!(first.text(), "http://a/1");

    let sent = client.client().transport().sent();
    assert!(sent[0].body.contains("<url>http://a/0</url>"));
    assert!(sent[1].body.contains("<listItemID>3</listItemID>"));
}

#[test]
fn faults_surface_through_the_typed_client() {
    let registry = lists::registry();
    let descriptor = registry.lookup(lists::GET_LIST_COLLECTION).unwrap();
    let fault = SoapFault::new("soapenv:Server", "Access denied.");
    let body = String::from_utf8(codec::encode_fault(descriptor, &fault).unwrap()).unwrap();

    let client = lists_client(RecordingTransport::new().reply(500, body));
    match client.get_list_collection() {
        Err(Error::SoapFault { fault: raw, .. }) => assert_eq!(raw.message(), "Access denied."),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn encoded_responses_decode_with_the_same_descriptor() {
    let registry = lists::registry();
    let descriptor = registry.lookup(lists::GET_LIST).unwrap();
    let result = XmlElement::new(QualifiedName::new(NS, "GetListResult")).with_child(
        XmlElement::new(QualifiedName::new(NS, "List")).with_attribute("Title".into(), "Tasks"),
    );
    let fields = splists::Fields::new().with("GetListResult", result);

    let bytes = codec::encode_response(descriptor, &fields).unwrap();
    assert_eq!(
        codec::decode_response(descriptor, &bytes).unwrap(),
        Reply::Completed(fields)
    );
}

#[test]
fn blank_leaf_text_survives_a_response_round_trip() {
    let registry = lists::registry();
    let descriptor = registry.lookup(lists::GET_LIST).unwrap();
    let result = XmlElement::new(QualifiedName::new(NS, "GetListResult"))
        .with_child(XmlElement::new(QualifiedName::new(NS, "Field")).with_text(" "));
    let fields = splists::Fields::new().with("GetListResult", result);

    let bytes = codec::encode_response(descriptor, &fields).unwrap();
    assert_eq!(
        codec::decode_response(descriptor, &bytes).unwrap(),
        Reply::Completed(fields)
    );
}

#[test]
fn cdata_results_are_not_escaped() {
    let transport = RecordingTransport::new().reply(
        200,
        envelope(
            r#"<AddAttachmentResponse xmlns="http://schemas.microsoft.com/sharepoint/soap/"><AddAttachmentResult><![CDATA[http://x/a?b=1&c=<2>]]></AddAttachmentResult></AddAttachmentResponse>"#,
        ),
    );
    let client = lists_client(transport);

    let url = client.add_attachment("Tasks", "1", "a", b"").unwrap();
    assert_eq!(url.as_deref(), Some("http://x/a?b=1&c=<2>"));
}
